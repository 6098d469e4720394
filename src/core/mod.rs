//! Core model vocabulary.
//!
//! This module holds the pure parts of the machine:
//! - typed ids and node kinds for the containment tree ([`element`])
//! - ancestry and lowest-common-ancestor helpers ([`tree`])
//! - guard predicates ([`guard`])
//! - the per-instance state contract ([`instance`])
//!
//! Nothing here performs a traversal; the imperative shell lives in
//! [`crate::machine`].

pub mod element;
pub mod guard;
pub mod instance;
pub mod tree;

pub use element::{
    Action, Element, PseudoStateKind, RegionId, StateId, TransitionId, TransitionKind, VertexId,
};
pub use guard::Guard;
pub use instance::{DefaultInstance, Instance};
