//! The bootstrap pass: lowering the model graph into step lists.
//!
//! The compiler walks the containment tree once, depth first with leaves
//! first, and emits for every vertex its leave / begin-enter / end-enter
//! cascades, for every region its entry-point record, and for every
//! transition the traverse plan implementing its exact semantics. The walk
//! is also where authoring mistakes that only show up in context are caught:
//! an entry point with the wrong number of outgoing transitions, a guarded
//! initial transition, an else guard outside a junction or choice.

use tracing::debug;

use crate::core::element::{
    Element, PseudoStateKind, RegionId, TransitionId, TransitionKind, VertexId,
};
use crate::core::tree;
use crate::machine::error::ModelError;
use crate::machine::plan::{Compiled, CompiledRegion, CompiledVertex, Step};
use crate::machine::StateMachine;

impl<M, I> StateMachine<M, I> {
    pub(crate) fn compile(&mut self) -> Result<(), ModelError> {
        let mut compiled = Compiled {
            vertices: vec![CompiledVertex::default(); self.vertices.len()],
            regions: vec![CompiledRegion::default(); self.regions.len()],
            transitions: vec![Vec::new(); self.transitions.len()],
            on_initialise: Vec::new(),
        };

        for (index, node) in self.regions.iter().enumerate() {
            if node.removed {
                continue;
            }
            compiled.regions[index].initial = node.vertices.iter().copied().find_map(|vertex| {
                self.vertex_node(vertex)
                    .pseudo_kind()
                    .filter(|kind| kind.is_initial())
                    .map(|kind| (vertex, kind))
            });
        }

        self.compile_vertex(self.root.vertex(), &mut compiled)?;

        for index in 0..self.transitions.len() {
            if self.transitions[index].removed {
                continue;
            }
            let id = TransitionId(index as u32);
            compiled.transitions[index] = self.compile_transition(id)?;
        }

        compiled.on_initialise = vec![
            Step::EnterState(self.root.vertex()),
            Step::EndEnter(self.root.vertex()),
        ];

        debug!(
            machine = %self.name(),
            vertices = self.vertices.len(),
            transitions = self.transitions.len(),
            "compiled"
        );
        self.compiled = Some(compiled);
        self.clean = true;
        Ok(())
    }

    fn compile_vertex(&self, vertex: VertexId, compiled: &mut Compiled) -> Result<(), ModelError> {
        let node = self.vertex_node(vertex);
        let record = match node.pseudo_kind() {
            None => {
                let regions: Vec<RegionId> = node
                    .state()
                    .map(|data| data.regions.clone())
                    .unwrap_or_default();
                for region in &regions {
                    for child in self.vertices_of(*region) {
                        self.compile_vertex(*child, compiled)?;
                    }
                }
                self.compile_state(vertex, &regions)
            }
            Some(kind) => self.compile_pseudo(vertex, kind)?,
        };
        compiled.vertices[vertex.0 as usize] = record;
        Ok(())
    }

    fn compile_state(&self, vertex: VertexId, regions: &[RegionId]) -> CompiledVertex {
        let mut leave: Vec<Step> = regions.iter().rev().map(|r| Step::ExitRegion(*r)).collect();
        leave.push(Step::ExitState(vertex));

        let begin_enter = vec![Step::EnterState(vertex)];

        let mut end_enter: Vec<Step> = regions.iter().map(|r| Step::EnterRegion(*r)).collect();
        if self.is_final_state(vertex) {
            end_enter.push(Step::CompleteEnclosing(vertex));
        } else if !self.outgoing(vertex).is_empty() {
            end_enter.push(Step::EvaluateCompletions(vertex));
        }

        CompiledVertex {
            leave,
            begin_enter,
            end_enter,
        }
    }

    fn compile_pseudo(
        &self,
        vertex: VertexId,
        kind: PseudoStateKind,
    ) -> Result<CompiledVertex, ModelError> {
        let end_enter = match kind {
            PseudoStateKind::Initial
            | PseudoStateKind::ShallowHistory
            | PseudoStateKind::DeepHistory => {
                let outgoing = self.outgoing(vertex);
                if outgoing.len() != 1 {
                    return Err(ModelError::InitialOutgoingCount {
                        vertex: self.qualified_name(vertex),
                        count: outgoing.len(),
                    });
                }
                let transition = outgoing[0];
                if !self.transition_node(transition).guard.is_always() {
                    return Err(ModelError::GuardedInitialTransition {
                        vertex: self.qualified_name(vertex),
                    });
                }
                vec![Step::Traverse(transition)]
            }
            PseudoStateKind::Junction | PseudoStateKind::Choice => vec![Step::Branch(vertex)],
            PseudoStateKind::Terminate => vec![Step::Terminate],
        };

        Ok(CompiledVertex {
            leave: vec![Step::ExitPseudo(vertex)],
            begin_enter: vec![Step::EnterPseudo(vertex)],
            end_enter,
        })
    }

    fn compile_transition(&self, id: TransitionId) -> Result<Vec<Step>, ModelError> {
        let node = self.transition_node(id);

        if node.guard.is_else() {
            let branch = matches!(
                self.vertex_node(node.source).pseudo_kind(),
                Some(PseudoStateKind::Junction) | Some(PseudoStateKind::Choice)
            );
            if !branch {
                return Err(ModelError::ElseOutsideBranch {
                    vertex: self.qualified_name(node.source),
                });
            }
        }

        let Some(target) = node.target else {
            return Ok(self.plan_internal(id, node.source));
        };

        match node.kind {
            TransitionKind::Internal => Ok(self.plan_internal(id, node.source)),
            TransitionKind::Local => Ok(self.plan_local(id, node.source, target)),
            TransitionKind::External => Ok(self.plan_external(id, node.source, target)),
        }
    }

    fn plan_internal(&self, id: TransitionId, source: VertexId) -> Vec<Step> {
        vec![Step::Effect(id), Step::InternalCompletion(source)]
    }

    /// Local semantics: the compound state shared by source and target stays
    /// active. A descendant target exits and re-enters only the branch
    /// holding it; a self or ancestor target exits the active chain beneath
    /// the target and re-enters its regions.
    fn plan_local(&self, id: TransitionId, source: VertexId, target: VertexId) -> Vec<Step> {
        if source == target {
            return self.plan_local_within(id, target);
        }

        let source_path = self.ancestry_of(Element::Vertex(source));
        let target_path = self.ancestry_of(Element::Vertex(target));
        let lca = tree::lowest_common_ancestor(&source_path, &target_path).unwrap_or(0);

        if lca == target_path.len() - 1 {
            return self.plan_local_within(id, target);
        }

        // eligibility was normalised at construction; anything not on the
        // source's branch traverses externally
        if lca != source_path.len() - 1 || lca + 1 >= target_path.len() {
            return self.plan_external(id, source, target);
        }
        let Element::Region(branch) = target_path[lca + 1] else {
            return self.plan_external(id, source, target);
        };

        let mut plan = vec![Step::ExitRegion(branch), Step::Effect(id)];
        self.push_entries(&mut plan, &target_path, lca + 2, target);
        plan
    }

    /// Local traversal that begins and ends at `target`: its regions are
    /// exited in reverse order and re-entered through the ordinary cascade.
    fn plan_local_within(&self, id: TransitionId, target: VertexId) -> Vec<Step> {
        let regions: &[RegionId] = match self.as_state(target) {
            Some(state) => self.regions_of(state),
            None => &[],
        };
        let mut plan: Vec<Step> = regions.iter().rev().map(|r| Step::ExitRegion(*r)).collect();
        plan.push(Step::Effect(id));
        plan.push(Step::EndEnter(target));
        plan
    }

    /// External semantics: exit the element below the least common ancestor
    /// on the source side, then enter down the target side. When source and
    /// target share one branch, the common ancestor vertex itself is exited
    /// and re-entered.
    fn plan_external(&self, id: TransitionId, source: VertexId, target: VertexId) -> Vec<Step> {
        let source_path = self.ancestry_of(Element::Vertex(source));
        let target_path = self.ancestry_of(Element::Vertex(target));
        let lca = tree::lowest_common_ancestor(&source_path, &target_path).unwrap_or(0);

        let same_branch = lca == source_path.len() - 1 || lca == target_path.len() - 1;
        let boundary = if same_branch { lca } else { lca + 1 };

        let mut plan = Vec::new();

        // pseudo states do not linger: a pseudo source strictly below the
        // exit boundary is left explicitly, since the boundary's cascade only
        // reaches states recorded as current
        if self.vertex_node(source).pseudo_kind().is_some()
            && source_path[boundary] != Element::Vertex(source)
        {
            plan.push(Step::Leave(source));
        }

        match source_path[boundary] {
            Element::Vertex(vertex) => plan.push(Step::Leave(vertex)),
            Element::Region(region) => plan.push(Step::ExitRegion(region)),
        }

        plan.push(Step::Effect(id));
        self.push_entries(&mut plan, &target_path, boundary, target);
        plan
    }

    /// Appends begin-enter steps for the vertices of `path[from..]` and the
    /// target's end-enter cascade. A history target is not entered directly:
    /// its owning region is, so restoration applies.
    fn push_entries(&self, plan: &mut Vec<Step>, path: &[Element], from: usize, target: VertexId) {
        let history_target = self
            .vertex_node(target)
            .pseudo_kind()
            .map(PseudoStateKind::is_history)
            == Some(true);

        for element in &path[from.min(path.len())..] {
            let Element::Vertex(vertex) = element else {
                continue;
            };
            if *vertex == target && history_target {
                break;
            }
            if self.vertex_node(*vertex).pseudo_kind().is_some() {
                plan.push(Step::EnterPseudo(*vertex));
            } else {
                plan.push(Step::EnterState(*vertex));
            }
        }

        if history_target {
            if let Some(region) = self.vertex_node(target).parent {
                plan.push(Step::EnterRegion(region));
            }
        } else {
            plan.push(Step::EndEnter(target));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::StateId;
    use crate::core::instance::DefaultInstance;

    type Machine = StateMachine<&'static str, DefaultInstance>;

    fn toggle() -> (Machine, StateId, StateId, TransitionId, TransitionId) {
        let mut sm = Machine::new("player");
        let region = sm.region("r", sm.root()).unwrap();
        let initial = sm
            .pseudo_state("initial", PseudoStateKind::Initial, region)
            .unwrap();
        let off = sm.state("off", region).unwrap();
        let on = sm.state("on", region).unwrap();
        sm.transition(initial, off).unwrap();
        let flip_on = sm
            .transition(off, on)
            .unwrap()
            .when(|m, _| m == Some(&"flip"))
            .id();
        let flip_off = sm
            .transition(on, off)
            .unwrap()
            .when(|m, _| m == Some(&"flip"))
            .id();
        (sm, off, on, flip_on, flip_off)
    }

    #[test]
    fn simple_external_plan_exits_effects_enters() {
        let (mut sm, off, on, flip_on, _) = toggle();
        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        assert_eq!(
            compiled.traverse_plan(flip_on),
            &[
                Step::Leave(off.vertex()),
                Step::Effect(flip_on),
                Step::EnterState(on.vertex()),
                Step::EndEnter(on.vertex()),
            ]
        );
    }

    #[test]
    fn initial_pseudo_state_plans_its_single_transition() {
        let (mut sm, _, _, _, _) = toggle();
        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        let region = sm.regions_of(sm.root())[0];
        let (initial, kind) = compiled.region(region).initial.unwrap();
        assert_eq!(kind, PseudoStateKind::Initial);
        assert_eq!(
            compiled.vertex(initial).end_enter,
            vec![Step::Traverse(TransitionId(0))]
        );
    }

    #[test]
    fn initial_without_outgoing_fails_compilation() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        sm.pseudo_state("initial", PseudoStateKind::Initial, region)
            .unwrap();
        sm.state("s", region).unwrap();

        assert!(matches!(
            sm.initialise_model().unwrap_err(),
            ModelError::InitialOutgoingCount { count: 0, .. }
        ));
    }

    #[test]
    fn guarded_initial_transition_fails_compilation() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let initial = sm
            .pseudo_state("initial", PseudoStateKind::Initial, region)
            .unwrap();
        let s = sm.state("s", region).unwrap();
        sm.transition(initial, s).unwrap().when(|_, _| true);

        assert!(matches!(
            sm.initialise_model().unwrap_err(),
            ModelError::GuardedInitialTransition { .. }
        ));
    }

    #[test]
    fn else_guard_outside_branches_fails_compilation() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let initial = sm
            .pseudo_state("initial", PseudoStateKind::Initial, region)
            .unwrap();
        let a = sm.state("a", region).unwrap();
        let b = sm.state("b", region).unwrap();
        sm.transition(initial, a).unwrap();
        sm.transition(a, b).unwrap().otherwise();

        assert!(matches!(
            sm.initialise_model().unwrap_err(),
            ModelError::ElseOutsideBranch { .. }
        ));
    }

    #[test]
    fn external_plan_across_composites_exits_to_the_lca_boundary() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let left = sm.state("left", region).unwrap();
        let a = sm.state("a", left).unwrap();
        let right = sm.state("right", region).unwrap();
        let b = sm.state("b", right).unwrap();
        let cross = sm.transition(a, b).unwrap().id();

        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        // the boundary below the lca region is `left`; entry descends
        // through `right` down to `b`
        assert_eq!(
            compiled.traverse_plan(cross),
            &[
                Step::Leave(left.vertex()),
                Step::Effect(cross),
                Step::EnterState(right.vertex()),
                Step::EnterState(b.vertex()),
                Step::EndEnter(b.vertex()),
            ]
        );
    }

    #[test]
    fn external_self_transition_exits_and_reenters_the_source() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let initial = sm
            .pseudo_state("initial", PseudoStateKind::Initial, region)
            .unwrap();
        let s = sm.state("s", region).unwrap();
        sm.transition(initial, s).unwrap();
        let again = sm.transition(s, s).unwrap().when(|m, _| m == Some(&"again")).id();

        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        assert_eq!(
            compiled.traverse_plan(again),
            &[
                Step::Leave(s.vertex()),
                Step::Effect(again),
                Step::EnterState(s.vertex()),
                Step::EndEnter(s.vertex()),
            ]
        );
    }

    #[test]
    fn pseudo_source_below_the_boundary_is_left_explicitly() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let outer = sm.state("outer", region).unwrap();
        let inner = sm.region("inner", outer).unwrap();
        let choice = sm
            .pseudo_state("choice", PseudoStateKind::Choice, inner)
            .unwrap();
        let elsewhere = sm.state("elsewhere", region).unwrap();
        let escape = sm.transition(choice, elsewhere).unwrap().id();

        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        assert_eq!(
            compiled.traverse_plan(escape),
            &[
                Step::Leave(choice),
                Step::Leave(outer.vertex()),
                Step::Effect(escape),
                Step::EnterState(elsewhere.vertex()),
                Step::EndEnter(elsewhere.vertex()),
            ]
        );
    }

    #[test]
    fn local_plan_keeps_the_source_active() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let outer = sm.state("outer", region).unwrap();
        let inner = sm.region("inner", outer).unwrap();
        let a = sm.state("a", inner).unwrap();
        let b = sm.state("b", inner).unwrap();
        let _ = a;
        let jump = sm.transition(outer, b).unwrap().local().id();

        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        assert_eq!(
            compiled.traverse_plan(jump),
            &[
                Step::ExitRegion(inner),
                Step::Effect(jump),
                Step::EnterState(b.vertex()),
                Step::EndEnter(b.vertex()),
            ]
        );
    }

    #[test]
    fn local_plan_to_an_ancestor_resets_its_regions() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let outer = sm.state("outer", region).unwrap();
        let inner = sm.region("inner", outer).unwrap();
        let a = sm.state("a", inner).unwrap();
        let reset = sm.transition(a, outer).unwrap().local().id();

        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        // the ancestor is not exited; the chain beneath it is, and its
        // region re-enters through the cascade
        assert_eq!(
            compiled.traverse_plan(reset),
            &[
                Step::ExitRegion(inner),
                Step::Effect(reset),
                Step::EndEnter(outer.vertex()),
            ]
        );
    }

    #[test]
    fn history_targets_enter_their_region_instead() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let outer = sm.state("outer", region).unwrap();
        let inner = sm.region("inner", outer).unwrap();
        let history = sm
            .pseudo_state("history", PseudoStateKind::ShallowHistory, inner)
            .unwrap();
        let a = sm.state("a", inner).unwrap();
        sm.transition(history, a).unwrap();
        let other = sm.state("other", region).unwrap();
        let back = sm.transition(other, history).unwrap().id();

        sm.initialise_model().unwrap();
        let compiled = sm.compiled.as_ref().unwrap();

        assert_eq!(
            compiled.traverse_plan(back),
            &[
                Step::Leave(other.vertex()),
                Step::Effect(back),
                Step::EnterState(outer.vertex()),
                Step::EnterRegion(inner),
            ]
        );
    }
}
