//! The step interpreter and message dispatch.
//!
//! Execution is a straight-line walk over compiled step lists. The only
//! decisions taken at run time are the ones that depend on the instance:
//! which state a region restores, which branch a junction or choice selects,
//! whether a state is complete, and whether the instance has terminated.
//! The interpreter threads the dispatched message and the deep-history flag
//! through every list; a terminated instance halts the walk between any two
//! steps.

use tracing::trace;

use crate::core::element::{PseudoStateKind, RegionId, StateId, TransitionId, VertexId};
use crate::core::instance::Instance;
use crate::machine::error::SemanticError;
use crate::machine::plan::{Compiled, Step};
use crate::machine::StateMachine;

impl<M, I: Instance> StateMachine<M, I> {
    pub(crate) fn run_steps(
        &self,
        compiled: &Compiled,
        steps: &[Step],
        instance: &mut I,
        message: Option<&M>,
        deep: bool,
    ) -> Result<(), SemanticError> {
        for step in steps {
            if instance.is_terminated() {
                return Ok(());
            }
            self.run_step(compiled, *step, instance, message, deep)?;
        }
        Ok(())
    }

    fn run_step(
        &self,
        compiled: &Compiled,
        step: Step,
        instance: &mut I,
        message: Option<&M>,
        deep: bool,
    ) -> Result<(), SemanticError> {
        match step {
            Step::EnterState(vertex) => {
                trace!(state = %self.qualified_name(vertex), "enter");
                let node = self.vertex_node(vertex);
                if let Some(region) = node.parent {
                    instance.set_current(region, StateId(vertex));
                }
                if let Some(data) = node.state() {
                    for action in &data.entry {
                        action(message, instance);
                    }
                }
                Ok(())
            }
            Step::EnterPseudo(vertex) => {
                trace!(vertex = %self.qualified_name(vertex), "enter");
                Ok(())
            }
            Step::ExitState(vertex) => {
                trace!(state = %self.qualified_name(vertex), "leave");
                if let Some(data) = self.vertex_node(vertex).state() {
                    for action in &data.exit {
                        action(message, instance);
                    }
                }
                Ok(())
            }
            Step::ExitPseudo(vertex) => {
                trace!(vertex = %self.qualified_name(vertex), "leave");
                Ok(())
            }
            Step::Leave(vertex) => {
                self.run_steps(compiled, &compiled.vertex(vertex).leave, instance, message, deep)
            }
            Step::ExitRegion(region) => match instance.get_current(region) {
                Some(current) => self.run_steps(
                    compiled,
                    &compiled.vertex(current.vertex()).leave,
                    instance,
                    message,
                    deep,
                ),
                None => Ok(()),
            },
            Step::EnterRegion(region) => {
                // a cascade can leave its owner mid-list (a branch or
                // completion fired outward); stale entries must not run
                if self.is_active(self.region_node(region).parent.vertex(), instance) {
                    self.enter_region(compiled, region, instance, message, deep)
                } else {
                    Ok(())
                }
            }
            Step::EndEnter(vertex) => self.run_steps(
                compiled,
                &compiled.vertex(vertex).end_enter,
                instance,
                message,
                deep,
            ),
            Step::Effect(transition) => {
                for action in &self.transition_node(transition).effect {
                    action(message, instance);
                }
                Ok(())
            }
            Step::Traverse(transition) => self.run_steps(
                compiled,
                compiled.traverse_plan(transition),
                instance,
                message,
                deep,
            ),
            Step::Branch(vertex) => self.branch(compiled, vertex, instance, message, deep),
            Step::EvaluateCompletions(vertex) => {
                self.evaluate_completions(compiled, vertex, instance, deep)
            }
            Step::CompleteEnclosing(vertex) => {
                match self.vertex_node(vertex).parent {
                    Some(region) => {
                        let enclosing = self.region_node(region).parent;
                        self.evaluate_completions(compiled, enclosing.vertex(), instance, deep)
                    }
                    None => Ok(()),
                }
            }
            Step::InternalCompletion(vertex) => {
                if self.settings().internal_transitions_trigger_completion {
                    self.evaluate_completions(compiled, vertex, instance, deep)
                } else {
                    Ok(())
                }
            }
            Step::Terminate => {
                trace!(machine = %self.name(), "terminate");
                instance.set_terminated(true);
                Ok(())
            }
        }
    }

    fn enter_vertex(
        &self,
        compiled: &Compiled,
        vertex: VertexId,
        instance: &mut I,
        message: Option<&M>,
        deep: bool,
    ) -> Result<(), SemanticError> {
        self.run_steps(compiled, &compiled.vertex(vertex).begin_enter, instance, message, deep)?;
        self.run_steps(compiled, &compiled.vertex(vertex).end_enter, instance, message, deep)
    }

    /// Region entry: restore the last-known state when history applies,
    /// otherwise take the entry point.
    fn enter_region(
        &self,
        compiled: &Compiled,
        region: RegionId,
        instance: &mut I,
        message: Option<&M>,
        deep: bool,
    ) -> Result<(), SemanticError> {
        let initial = compiled.region(region).initial;
        let restores = deep
            || initial
                .map(|(_, kind)| kind.is_history())
                .unwrap_or(false);
        if restores {
            if let Some(current) = instance.get_current(region) {
                let deep_below = deep
                    || initial
                        .map(|(_, kind)| kind == PseudoStateKind::DeepHistory)
                        .unwrap_or(false);
                return self.enter_vertex(
                    compiled,
                    current.vertex(),
                    instance,
                    message,
                    deep_below,
                );
            }
        }
        match initial {
            Some((vertex, _)) => self.enter_vertex(compiled, vertex, instance, message, deep),
            None => Err(SemanticError::RegionWithoutEntry {
                region: self.qualified_name(region),
            }),
        }
    }

    /// Junction and choice selection. Guards are evaluated exactly once.
    fn branch(
        &self,
        compiled: &Compiled,
        vertex: VertexId,
        instance: &mut I,
        message: Option<&M>,
        deep: bool,
    ) -> Result<(), SemanticError> {
        use crate::core::element::PseudoStateKind::{Choice, Junction};

        let mut enabled: Vec<TransitionId> = Vec::new();
        let mut otherwise: Option<TransitionId> = None;
        for transition in self.outgoing(vertex) {
            let node = self.transition_node(*transition);
            if node.guard.is_else() {
                otherwise = Some(*transition);
            } else if node.guard.check(message, instance) {
                enabled.push(*transition);
            }
        }

        let selected = match self.vertex_node(vertex).pseudo_kind() {
            Some(Junction) => match enabled.len() {
                1 => enabled[0],
                0 => otherwise.ok_or_else(|| SemanticError::JunctionSelection {
                    vertex: self.qualified_name(vertex),
                    enabled: 0,
                })?,
                many => {
                    return Err(SemanticError::JunctionSelection {
                        vertex: self.qualified_name(vertex),
                        enabled: many,
                    })
                }
            },
            Some(Choice) => match enabled.len() {
                0 => otherwise.ok_or_else(|| SemanticError::ChoiceSelection {
                    vertex: self.qualified_name(vertex),
                })?,
                1 => enabled[0],
                many => enabled[self.settings().random(many).min(many - 1)],
            },
            _ => return Ok(()),
        };

        self.run_steps(compiled, compiled.traverse_plan(selected), instance, message, deep)
    }

    /// Fires the completion transition of `vertex` if it is a complete state
    /// with exactly one enabled transition. Completion sees no message.
    fn evaluate_completions(
        &self,
        compiled: &Compiled,
        vertex: VertexId,
        instance: &mut I,
        deep: bool,
    ) -> Result<(), SemanticError> {
        let Some(state) = self.as_state(vertex) else {
            return Ok(());
        };
        if !self.is_active(vertex, instance) || !self.is_complete(state, instance) {
            return Ok(());
        }

        let mut enabled: Vec<TransitionId> = Vec::new();
        for transition in self.outgoing(vertex) {
            let node = self.transition_node(*transition);
            if !node.guard.is_else() && node.guard.check(None, instance) {
                enabled.push(*transition);
            }
        }

        match enabled.len() {
            0 => Ok(()),
            1 => {
                trace!(state = %self.qualified_name(vertex), "completion");
                self.run_steps(compiled, compiled.traverse_plan(enabled[0]), instance, None, deep)
            }
            _ => Err(SemanticError::ConflictingCompletions {
                state: self.qualified_name(vertex),
            }),
        }
    }

    /// Deepest-first dispatch: active child regions are offered the message
    /// before the state's own transitions; sibling regions keep receiving it
    /// only while the state stays active.
    pub(crate) fn evaluate_state(
        &self,
        compiled: &Compiled,
        state: StateId,
        instance: &mut I,
        message: &M,
    ) -> Result<bool, SemanticError> {
        let mut consumed = false;
        for region in self.regions_of(state) {
            let Some(current) = instance.get_current(*region) else {
                continue;
            };
            if self.evaluate_state(compiled, current, instance, message)? {
                consumed = true;
                if instance.is_terminated() || !self.is_active(state, instance) {
                    return Ok(true);
                }
            }
        }
        if consumed {
            return Ok(true);
        }

        let mut enabled: Vec<TransitionId> = Vec::new();
        for transition in self.outgoing(state) {
            let node = self.transition_node(*transition);
            if !node.guard.is_else() && node.guard.check(Some(message), instance) {
                enabled.push(*transition);
            }
        }
        match enabled.len() {
            0 => Ok(false),
            1 => {
                trace!(state = %self.qualified_name(state), "transition");
                self.run_steps(
                    compiled,
                    compiled.traverse_plan(enabled[0]),
                    instance,
                    Some(message),
                    false,
                )?;
                Ok(true)
            }
            _ => Err(SemanticError::ConflictingTransitions {
                vertex: self.qualified_name(state),
            }),
        }
    }
}
