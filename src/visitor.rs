//! Read-only traversal of a model.
//!
//! A [`Visitor`] receives one callback per element kind as [`accept`] walks
//! the containment tree depth first (transitions last, in arena order). The
//! default implementations cascade to the more general kind, so a visitor
//! overrides only the hooks it cares about.

use crate::core::element::{Element, RegionId, StateId, TransitionId, VertexId};
use crate::machine::StateMachine;

/// Callbacks invoked by [`accept`].
///
/// The default methods forward `final state → state → vertex → element` and
/// `pseudo state → vertex → element`, mirroring the kind hierarchy.
pub trait Visitor<M, I> {
    /// Called for every element unless a more specific hook intercepts it.
    fn visit_element(&mut self, machine: &StateMachine<M, I>, element: Element) {
        let _ = (machine, element);
    }

    /// A region.
    fn visit_region(&mut self, machine: &StateMachine<M, I>, region: RegionId) {
        self.visit_element(machine, region.into());
    }

    /// Any vertex.
    fn visit_vertex(&mut self, machine: &StateMachine<M, I>, vertex: VertexId) {
        self.visit_element(machine, vertex.into());
    }

    /// A pseudo state.
    fn visit_pseudo_state(&mut self, machine: &StateMachine<M, I>, vertex: VertexId) {
        self.visit_vertex(machine, vertex);
    }

    /// A non-final state.
    fn visit_state(&mut self, machine: &StateMachine<M, I>, state: StateId) {
        self.visit_vertex(machine, state.vertex());
    }

    /// A final state.
    fn visit_final_state(&mut self, machine: &StateMachine<M, I>, state: StateId) {
        self.visit_state(machine, state);
    }

    /// The machine root.
    fn visit_state_machine(&mut self, machine: &StateMachine<M, I>) {
        self.visit_state(machine, machine.root());
    }

    /// A transition.
    fn visit_transition(&mut self, machine: &StateMachine<M, I>, transition: TransitionId) {
        let _ = (machine, transition);
    }
}

impl<M, I> StateMachine<M, I> {
    /// Walks the model with `visitor`; see [`accept`].
    pub fn accept<V: Visitor<M, I>>(&self, visitor: &mut V) {
        accept(self, visitor);
    }
}

/// Walks the model, invoking the visitor per element kind.
pub fn accept<M, I, V: Visitor<M, I>>(machine: &StateMachine<M, I>, visitor: &mut V) {
    visitor.visit_state_machine(machine);
    accept_state(machine, machine.root(), visitor);
    for index in 0..machine.transition_count() {
        let id = TransitionId(index as u32);
        if machine.transition_exists(id) {
            visitor.visit_transition(machine, id);
        }
    }
}

fn accept_state<M, I, V: Visitor<M, I>>(
    machine: &StateMachine<M, I>,
    state: StateId,
    visitor: &mut V,
) {
    for region in machine.regions_of(state) {
        visitor.visit_region(machine, *region);
        for vertex in machine.vertices_of(*region) {
            match machine.as_state(*vertex) {
                Some(child) => {
                    if machine.is_final_state(child) {
                        visitor.visit_final_state(machine, child);
                    } else {
                        visitor.visit_state(machine, child);
                    }
                    accept_state(machine, child, visitor);
                }
                None => visitor.visit_pseudo_state(machine, *vertex),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::PseudoStateKind;
    use crate::core::instance::DefaultInstance;

    type Machine = StateMachine<&'static str, DefaultInstance>;

    #[derive(Default)]
    struct Census {
        regions: usize,
        states: usize,
        finals: usize,
        pseudo: usize,
        transitions: usize,
        elements: usize,
    }

    impl Visitor<&'static str, DefaultInstance> for Census {
        fn visit_element(&mut self, _machine: &Machine, _element: Element) {
            self.elements += 1;
        }

        fn visit_region(&mut self, machine: &Machine, region: RegionId) {
            self.regions += 1;
            self.visit_element(machine, region.into());
        }

        fn visit_state(&mut self, machine: &Machine, state: StateId) {
            self.states += 1;
            self.visit_vertex(machine, state.vertex());
        }

        fn visit_final_state(&mut self, machine: &Machine, state: StateId) {
            self.finals += 1;
            self.visit_state(machine, state);
        }

        fn visit_pseudo_state(&mut self, machine: &Machine, vertex: VertexId) {
            self.pseudo += 1;
            self.visit_vertex(machine, vertex);
        }

        fn visit_transition(&mut self, _machine: &Machine, _transition: TransitionId) {
            self.transitions += 1;
        }
    }

    #[test]
    fn accept_reaches_every_element_once() {
        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        let initial = sm
            .pseudo_state("initial", PseudoStateKind::Initial, region)
            .unwrap();
        let composite = sm.state("composite", region).unwrap();
        let inner = sm.state("inner", composite).unwrap();
        let done = sm.final_state("done", region).unwrap();
        sm.transition(initial, composite).unwrap();
        sm.transition(composite, done)
            .unwrap()
            .when(|m, _| m == Some(&"finish"));
        let _ = inner;

        let mut census = Census::default();
        accept(&sm, &mut census);

        // root + composite + inner + done (final counts as a state too)
        assert_eq!(census.states, 4);
        assert_eq!(census.finals, 1);
        assert_eq!(census.pseudo, 1);
        // "r" plus the composite's synthesised default region
        assert_eq!(census.regions, 2);
        assert_eq!(census.transitions, 2);
        // every region and vertex cascaded down to visit_element
        assert_eq!(census.elements, census.regions + census.states + census.pseudo);
    }

    #[test]
    fn default_visitor_methods_cascade() {
        struct Names(Vec<String>);
        impl Visitor<&'static str, DefaultInstance> for Names {
            fn visit_element(&mut self, machine: &Machine, element: Element) {
                self.0.push(machine.qualified_name(element));
            }
        }

        let mut sm = Machine::new("m");
        let region = sm.region("r", sm.root()).unwrap();
        sm.state("a", region).unwrap();

        let mut names = Names(Vec::new());
        accept(&sm, &mut names);
        assert_eq!(names.0, vec!["m", "m.r", "m.r.a"]);
    }
}
