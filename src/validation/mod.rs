//! Structural validation of a model.
//!
//! `validate` sweeps the containment tree for conformance problems the
//! authoring API cannot reject on its own and accumulates every finding
//! instead of stopping at the first. Findings are reported through the log
//! sink (`tracing::error!` / `warn!`) and returned; validation never raises
//! and is never invoked automatically.

use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::element::{PseudoStateKind, RegionId, StateId};
use crate::machine::StateMachine;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    /// The machine will misbehave or raise at run time.
    Error,
    /// Suspicious but survivable.
    Warning,
}

/// One structural conformance finding.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Violation {
    #[error("region '{region}' has no initial pseudo state")]
    MissingInitial { region: String },

    #[error("region '{region}' has more than one initial pseudo state")]
    MultipleInitial { region: String },

    #[error("'{vertex}' has no non-else outgoing transition")]
    BranchWithoutOutgoing { vertex: String },

    #[error("'{vertex}' has more than one else transition")]
    MultipleElse { vertex: String },

    #[error("entry point '{vertex}' must have exactly one outgoing transition, found {count}")]
    EntryPointOutgoing { vertex: String, count: usize },

    #[error("'{vertex}' is unreachable: no incoming transitions and not an entry point")]
    Unreachable { vertex: String },
}

impl Violation {
    /// The finding's severity.
    pub fn severity(&self) -> Severity {
        match self {
            Violation::MissingInitial { .. }
            | Violation::MultipleInitial { .. }
            | Violation::BranchWithoutOutgoing { .. }
            | Violation::MultipleElse { .. }
            | Violation::EntryPointOutgoing { .. } => Severity::Error,
            Violation::Unreachable { .. } => Severity::Warning,
        }
    }
}

/// Checks a model against the structural invariants and returns every
/// finding, most serious first.
pub fn validate<M, I>(machine: &StateMachine<M, I>) -> Vec<Violation> {
    let mut violations = Vec::new();
    validate_state(machine, machine.root(), &mut violations);
    violations.sort_by_key(|v| match v.severity() {
        Severity::Error => 0,
        Severity::Warning => 1,
    });
    for violation in &violations {
        match violation.severity() {
            Severity::Error => error!(machine = %machine.name(), %violation, "validation"),
            Severity::Warning => warn!(machine = %machine.name(), %violation, "validation"),
        }
    }
    violations
}

fn validate_state<M, I>(machine: &StateMachine<M, I>, state: StateId, out: &mut Vec<Violation>) {
    for region in machine.regions_of(state) {
        validate_region(machine, *region, out);
    }
}

fn validate_region<M, I>(machine: &StateMachine<M, I>, region: RegionId, out: &mut Vec<Violation>) {
    let mut entry_points = 0usize;
    for vertex in machine.vertices_of(region) {
        let kind = machine.pseudo_state_kind(*vertex);
        if kind.map(PseudoStateKind::is_initial) == Some(true) {
            entry_points += 1;
            let outgoing = machine.outgoing(*vertex).len();
            if outgoing != 1 {
                out.push(Violation::EntryPointOutgoing {
                    vertex: machine.qualified_name(*vertex),
                    count: outgoing,
                });
            }
        }

        if matches!(kind, Some(PseudoStateKind::Junction) | Some(PseudoStateKind::Choice)) {
            let mut branches = 0usize;
            let mut elses = 0usize;
            for transition in machine.outgoing(*vertex) {
                if machine.transition_is_else(*transition) {
                    elses += 1;
                } else {
                    branches += 1;
                }
            }
            if branches == 0 {
                out.push(Violation::BranchWithoutOutgoing {
                    vertex: machine.qualified_name(*vertex),
                });
            }
            if elses > 1 {
                out.push(Violation::MultipleElse {
                    vertex: machine.qualified_name(*vertex),
                });
            }
        }

        let entry_point = kind.map(PseudoStateKind::is_initial) == Some(true);
        if !entry_point && machine.incoming(*vertex).is_empty() {
            out.push(Violation::Unreachable {
                vertex: machine.qualified_name(*vertex),
            });
        }

        if let Some(state) = machine.as_state(*vertex) {
            validate_state(machine, state, out);
        }
    }

    match entry_points {
        0 => out.push(Violation::MissingInitial {
            region: machine.qualified_name(region),
        }),
        1 => {}
        _ => out.push(Violation::MultipleInitial {
            region: machine.qualified_name(region),
        }),
    }
}
