//! Errors raised while authoring, compiling, and evaluating machines.

use thiserror::Error;

/// Errors from model construction and compilation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("region '{region}' already has an initial pseudo state '{existing}'")]
    DuplicateInitial { region: String, existing: String },

    #[error("'{vertex}' is a final state and cannot own a region")]
    RegionUnderFinalState { vertex: String },

    #[error("'{vertex}' is a final state and cannot have outgoing transitions")]
    TransitionFromFinalState { vertex: String },

    #[error("'{vertex}' is a terminate pseudo state and cannot have outgoing transitions")]
    TransitionFromTerminate { vertex: String },

    #[error("initial pseudo state '{vertex}' must have exactly one outgoing transition, found {count}")]
    InitialOutgoingCount { vertex: String, count: usize },

    #[error("initial pseudo state '{vertex}' cannot have a guarded outgoing transition")]
    GuardedInitialTransition { vertex: String },

    #[error("an else guard is only selectable from a junction or choice, not from '{vertex}'")]
    ElseOutsideBranch { vertex: String },

    #[error("'{element}' has been removed from the model")]
    RemovedElement { element: String },
}

/// Runtime errors: the machine turned out to be ill-formed while a message
/// was being processed.
///
/// These are raised, not logged; a terminated instance is not an error
/// (`evaluate` just reports the message unconsumed).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SemanticError {
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("the machine has not been initialised")]
    NotInitialised,

    #[error("region '{region}' has no initial pseudo state and no history to restore")]
    RegionWithoutEntry { region: String },

    #[error("multiple transitions enabled at '{vertex}'")]
    ConflictingTransitions { vertex: String },

    #[error("multiple completion transitions enabled at '{state}'")]
    ConflictingCompletions { state: String },

    #[error("junction '{vertex}' selected {enabled} branches and has no else")]
    JunctionSelection { vertex: String, enabled: usize },

    #[error("choice '{vertex}' has no enabled branch and no else")]
    ChoiceSelection { vertex: String },
}
