//! Guard predicates controlling transition selection.
//!
//! Guards are pure boolean functions over the dispatched message and the
//! instance. They decide which transition is enabled; they never mutate
//! anything.

/// Predicate deciding whether a transition is enabled.
///
/// A guard sees the message being dispatched (`None` during initialisation
/// and completion evaluation) and the instance. The default guard is always
/// true, which makes an unguarded transition act as a completion transition:
/// it is the only kind enabled when a state completes.
///
/// The *else* guard is a sentinel that is never true during ordinary
/// dispatch; junctions and choices select it when no other branch holds.
///
/// # Example
///
/// ```rust
/// use statetree::Guard;
///
/// let flip: Guard<&str, ()> = Guard::when(|message, _| message == Some(&"flip"));
///
/// assert!(flip.check(Some(&"flip"), &()));
/// assert!(!flip.check(Some(&"flop"), &()));
/// assert!(!flip.check(None, &()));
/// ```
pub struct Guard<M, I> {
    kind: GuardKind<M, I>,
}

enum GuardKind<M, I> {
    Always,
    When(Box<dyn Fn(Option<&M>, &I) -> bool + Send + Sync>),
    Else,
}

impl<M, I> Guard<M, I> {
    /// The default guard: enabled for every message, including completion.
    pub fn always() -> Self {
        Guard {
            kind: GuardKind::Always,
        }
    }

    /// A guard from a pure predicate over `(message, instance)`.
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn(Option<&M>, &I) -> bool + Send + Sync + 'static,
    {
        Guard {
            kind: GuardKind::When(Box::new(predicate)),
        }
    }

    /// The else sentinel, selected by a junction or choice only when no
    /// other branch is enabled.
    pub fn otherwise() -> Self {
        Guard {
            kind: GuardKind::Else,
        }
    }

    /// Evaluates the guard. The else sentinel reports false here; branch
    /// selection treats it specially.
    pub fn check(&self, message: Option<&M>, instance: &I) -> bool {
        match &self.kind {
            GuardKind::Always => true,
            GuardKind::When(predicate) => predicate(message, instance),
            GuardKind::Else => false,
        }
    }

    /// Whether this is the else sentinel.
    pub fn is_else(&self) -> bool {
        matches!(self.kind, GuardKind::Else)
    }

    /// Whether this is the default always-true guard.
    pub fn is_always(&self) -> bool {
        matches!(self.kind, GuardKind::Always)
    }
}

impl<M, I> Default for Guard<M, I> {
    fn default() -> Self {
        Guard::always()
    }
}

impl<M, I> std::fmt::Debug for Guard<M, I> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self.kind {
            GuardKind::Always => "Guard::always",
            GuardKind::When(_) => "Guard::when",
            GuardKind::Else => "Guard::otherwise",
        };
        f.write_str(label)
    }
}
