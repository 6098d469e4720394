//! Statetree: a hierarchical state machine runtime with UML semantics.
//!
//! A model is authored once as a tree of states, regions, and pseudo states
//! overlaid with guarded transitions, then compiled into flat enter/exit
//! cascades and driven by dispatching messages into any number of instances.
//! Composite and orthogonal states, shallow and deep history, junction and
//! choice branching, completion transitions, and terminate semantics are all
//! part of the model vocabulary.
//!
//! # Core concepts
//!
//! - **Model**: a [`StateMachine`] owning every node, addressed by typed ids
//! - **Instance**: per-execution state behind the [`Instance`] trait: the
//!   active state of each region plus the terminated flag
//! - **Compile step**: the first initialisation lowers the model into step
//!   lists, so dispatch is a straight-line walk with no re-computation
//! - **Guards and actions**: plain closures over the dispatched message and
//!   the instance
//!
//! # Example
//!
//! ```rust
//! use statetree::{DefaultInstance, PseudoStateKind, StateMachine};
//!
//! // model: off <-"flip"-> on
//! let mut player: StateMachine<&str> = StateMachine::new("player");
//! let region = player.region("r", player.root()).unwrap();
//! let initial = player
//!     .pseudo_state("initial", PseudoStateKind::Initial, region)
//!     .unwrap();
//! let off = player.state("off", region).unwrap();
//! let on = player.state("on", region).unwrap();
//! player.transition(initial, off).unwrap();
//! player
//!     .transition(off, on)
//!     .unwrap()
//!     .when(|message, _| message == Some(&"flip"));
//! player
//!     .transition(on, off)
//!     .unwrap()
//!     .when(|message, _| message == Some(&"flip"));
//!
//! // drive an instance
//! let mut instance = DefaultInstance::new("first");
//! player.initialise(&mut instance).unwrap();
//! assert!(player.is_active(off, &instance));
//!
//! assert!(player.evaluate(&mut instance, &"flip").unwrap());
//! assert!(player.is_active(on, &instance));
//!
//! // unmatched messages are not consumed
//! assert!(!player.evaluate(&mut instance, &"volume").unwrap());
//! ```

pub mod builder;
pub mod core;
pub mod machine;
pub mod validation;
pub mod visitor;

// Re-export commonly used types
pub use crate::builder::TransitionBuilder;
pub use crate::core::element::{
    Element, PseudoStateKind, RegionId, StateId, TransitionId, TransitionKind, VertexId,
};
pub use crate::core::guard::Guard;
pub use crate::core::instance::{DefaultInstance, Instance};
pub use crate::machine::error::{ModelError, SemanticError};
pub use crate::machine::{Settings, StateMachine, VertexParent};
pub use crate::validation::{validate, Severity, Violation};
pub use crate::visitor::{accept, Visitor};
