//! Fluent configuration of freshly authored transitions.
//!
//! [`StateMachine::transition`] and [`StateMachine::internal_transition`]
//! insert the transition immediately and hand back a [`TransitionBuilder`]
//! that borrows the machine, so guard, effects, and kind read as one chain:
//!
//! ```rust
//! use statetree::{PseudoStateKind, StateMachine};
//!
//! let mut sm: StateMachine<&str> = StateMachine::new("m");
//! let region = sm.region("r", sm.root()).unwrap();
//! let initial = sm.pseudo_state("initial", PseudoStateKind::Initial, region).unwrap();
//! let idle = sm.state("idle", region).unwrap();
//! let busy = sm.state("busy", region).unwrap();
//! sm.transition(initial, idle).unwrap();
//!
//! sm.transition(idle, busy)
//!     .unwrap()
//!     .when(|message, _| message == Some(&"start"))
//!     .effect(|_, _| println!("starting"));
//! ```

use crate::core::element::{Element, TransitionId, TransitionKind, VertexId};
use crate::core::guard::Guard;
use crate::machine::StateMachine;

/// Borrowing handle over one just-created transition.
///
/// Dropping the builder keeps the transition as configured so far; `id`
/// returns the handle needed to refer to it later.
pub struct TransitionBuilder<'m, M, I> {
    machine: &'m mut StateMachine<M, I>,
    id: TransitionId,
}

impl<'m, M, I> TransitionBuilder<'m, M, I> {
    pub(crate) fn new(machine: &'m mut StateMachine<M, I>, id: TransitionId) -> Self {
        Self { machine, id }
    }

    /// The transition's id.
    pub fn id(&self) -> TransitionId {
        self.id
    }

    /// Replaces the guard with a predicate over `(message, instance)`.
    ///
    /// Also known as `where` in other renditions of these semantics; `when`
    /// is the name that parses as Rust.
    pub fn when<F>(self, predicate: F) -> Self
    where
        F: Fn(Option<&M>, &I) -> bool + Send + Sync + 'static,
    {
        self.guard(Guard::when(predicate))
    }

    /// Replaces the guard wholesale.
    pub fn guard(self, guard: Guard<M, I>) -> Self {
        self.machine.transitions[self.id.0 as usize].guard = guard;
        self.machine.mark_dirty();
        self
    }

    /// Makes this the else branch of a junction or choice: taken only when
    /// no other outgoing guard holds.
    pub fn otherwise(self) -> Self {
        self.guard(Guard::otherwise())
    }

    /// Appends an effect action, run between the exit and entry cascades.
    pub fn effect<F>(self, action: F) -> Self
    where
        F: Fn(Option<&M>, &mut I) + Send + Sync + 'static,
    {
        self.machine.transitions[self.id.0 as usize]
            .effect
            .push(Box::new(action));
        self.machine.mark_dirty();
        self
    }

    /// Requests local semantics: honoured when source and target lie on one
    /// branch of the containment tree (either is an ancestor of the other,
    /// or they are the same state), otherwise the transition stays external.
    pub fn local(self) -> Self {
        let node = &self.machine.transitions[self.id.0 as usize];
        if node.kind != TransitionKind::External {
            return self;
        }
        let (source, target) = (node.source, node.target);
        if let Some(target) = target {
            if self.on_same_branch(source, target) {
                self.machine.transitions[self.id.0 as usize].kind = TransitionKind::Local;
                self.machine.mark_dirty();
            }
        }
        self
    }

    fn on_same_branch(&self, source: VertexId, target: VertexId) -> bool {
        if source == target {
            return true;
        }
        let source = Element::Vertex(source);
        let target = Element::Vertex(target);
        self.machine.ancestry_of(target).contains(&source)
            || self.machine.ancestry_of(source).contains(&target)
    }
}

impl<M, I> std::fmt::Debug for TransitionBuilder<'_, M, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionBuilder")
            .field("id", &self.id)
            .finish()
    }
}
