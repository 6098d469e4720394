//! Per-instance execution state.
//!
//! The model graph is shared and immutable during dispatch; everything that
//! changes as messages are processed lives in an instance. An instance is a
//! map from region identity to that region's last-known state, plus the
//! terminated flag. The map doubles as the history store: leaving a state
//! does not erase it, and shallow/deep history re-entry reads it back.

use std::collections::HashMap;

use crate::core::element::{RegionId, StateId};

/// Contract between the evaluator and per-instance storage.
///
/// The evaluator records the active state of each region through
/// `set_current` and reads it back through `get_current`. Regions are keyed
/// by identity, never by name. Implementations must retain the last-known
/// state after the region is exited; history restoration depends on it.
pub trait Instance {
    /// Records `state` as the current (and last-known) state of `region`.
    fn set_current(&mut self, region: RegionId, state: StateId);

    /// The last-known state of `region`, if it was ever entered.
    fn get_current(&self, region: RegionId) -> Option<StateId>;

    /// Whether a terminate pseudo state has been reached.
    fn is_terminated(&self) -> bool;

    /// Sets or clears the terminated flag.
    fn set_terminated(&mut self, terminated: bool);
}

/// Map-backed instance storage, sufficient for most clients.
///
/// Clients with their own context (counters, handles, domain data) can embed
/// a `DefaultInstance` and delegate the trait to it, keeping the extra data
/// visible to guards and actions.
///
/// # Example
///
/// ```rust
/// use statetree::{DefaultInstance, Instance};
///
/// let mut instance = DefaultInstance::new("player-1");
/// assert_eq!(instance.name(), "player-1");
/// assert!(!instance.is_terminated());
/// ```
#[derive(Debug, Clone, Default)]
pub struct DefaultInstance {
    name: String,
    current: HashMap<RegionId, StateId>,
    terminated: bool,
}

impl DefaultInstance {
    /// Creates a named instance with no recorded history.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current: HashMap::new(),
            terminated: false,
        }
    }

    /// The instance name, used in log events.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Instance for DefaultInstance {
    fn set_current(&mut self, region: RegionId, state: StateId) {
        self.current.insert(region, state);
    }

    fn get_current(&self, region: RegionId) -> Option<StateId> {
        self.current.get(&region).copied()
    }

    fn is_terminated(&self) -> bool {
        self.terminated
    }

    fn set_terminated(&mut self, terminated: bool) {
        self.terminated = terminated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::element::{StateId, VertexId};

    fn region(id: u32) -> RegionId {
        RegionId(id)
    }

    fn state(id: u32) -> StateId {
        StateId(VertexId(id))
    }

    #[test]
    fn current_state_is_tracked_per_region() {
        let mut instance = DefaultInstance::new("i");
        instance.set_current(region(0), state(1));
        instance.set_current(region(1), state(2));

        assert_eq!(instance.get_current(region(0)), Some(state(1)));
        assert_eq!(instance.get_current(region(1)), Some(state(2)));
        assert_eq!(instance.get_current(region(2)), None);
    }

    #[test]
    fn last_known_state_is_overwritten_not_cleared() {
        let mut instance = DefaultInstance::new("i");
        instance.set_current(region(0), state(1));
        instance.set_current(region(0), state(3));

        assert_eq!(instance.get_current(region(0)), Some(state(3)));
    }

    #[test]
    fn terminated_flag_round_trips() {
        let mut instance = DefaultInstance::new("i");
        assert!(!instance.is_terminated());
        instance.set_terminated(true);
        assert!(instance.is_terminated());
        instance.set_terminated(false);
        assert!(!instance.is_terminated());
    }
}
