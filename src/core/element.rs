//! Model vocabulary: ids, kinds, and arena node types.
//!
//! Model nodes live in arenas owned by the state machine and are addressed by
//! typed index ids. Ids are cheap copyable handles; identity (not name)
//! is what the runtime compares, so two regions with the same name never
//! alias.

use serde::{Deserialize, Serialize};

use super::guard::Guard;

/// Identifies a region within its owning state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionId(pub(crate) u32);

/// Identifies a vertex (state or pseudo state) within its owning machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VertexId(pub(crate) u32);

/// Identifies a vertex known to be a state (simple, composite, or final).
///
/// Converts losslessly into [`VertexId`]; the reverse direction goes through
/// the machine, which knows the vertex kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StateId(pub(crate) VertexId);

impl StateId {
    /// The underlying vertex id.
    pub fn vertex(self) -> VertexId {
        self.0
    }
}

impl From<StateId> for VertexId {
    fn from(state: StateId) -> Self {
        state.0
    }
}

/// Identifies a transition within its owning machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransitionId(pub(crate) u32);

/// A handle to any node of the containment tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Element {
    /// A region.
    Region(RegionId),
    /// A state or pseudo state.
    Vertex(VertexId),
}

impl From<RegionId> for Element {
    fn from(region: RegionId) -> Self {
        Element::Region(region)
    }
}

impl From<VertexId> for Element {
    fn from(vertex: VertexId) -> Self {
        Element::Vertex(vertex)
    }
}

impl From<StateId> for Element {
    fn from(state: StateId) -> Self {
        Element::Vertex(state.0)
    }
}

/// The closed set of pseudo state kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PseudoStateKind {
    /// Default entry point of a region.
    Initial,
    /// Entry point restoring the region's last-known state.
    ShallowHistory,
    /// Entry point restoring the last-known state recursively.
    DeepHistory,
    /// Static branch: guards are evaluated when the junction is reached and
    /// exactly one must hold (or the else is taken).
    Junction,
    /// Dynamic branch: one of the true guards is chosen at random.
    Choice,
    /// Entering it terminates the instance.
    Terminate,
}

impl PseudoStateKind {
    /// Whether this kind may act as a region's entry point.
    pub fn is_initial(self) -> bool {
        matches!(
            self,
            PseudoStateKind::Initial | PseudoStateKind::ShallowHistory | PseudoStateKind::DeepHistory
        )
    }

    /// Whether this kind restores history.
    pub fn is_history(self) -> bool {
        matches!(
            self,
            PseudoStateKind::ShallowHistory | PseudoStateKind::DeepHistory
        )
    }
}

/// Transition kinds, normalised at construction.
///
/// A transition without a target is forced to `Internal`; `Local` is honoured
/// only when the target lies under the source (or is the source itself), and
/// everything else is `External`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionKind {
    /// Exits up to (and including) the boundary below the least common
    /// ancestor, then enters down to the target.
    External,
    /// Re-targets within the source compound state without exiting it.
    Local,
    /// Runs its effects without exiting or entering anything.
    Internal,
}

/// A user action run during traversal.
///
/// Actions receive the message being dispatched (`None` during initialisation
/// and completion evaluation) and exclusive access to the instance.
pub type Action<M, I> = Box<dyn Fn(Option<&M>, &mut I) + Send + Sync>;

/// Arena node for a region.
pub(crate) struct RegionNode {
    pub(crate) name: String,
    pub(crate) parent: StateId,
    pub(crate) vertices: Vec<VertexId>,
    pub(crate) removed: bool,
}

/// Arena node for a vertex.
pub(crate) struct VertexNode<M, I> {
    pub(crate) name: String,
    /// `None` only for the machine root.
    pub(crate) parent: Option<RegionId>,
    pub(crate) kind: VertexKind<M, I>,
    pub(crate) outgoing: Vec<TransitionId>,
    pub(crate) incoming: Vec<TransitionId>,
    pub(crate) removed: bool,
}

pub(crate) enum VertexKind<M, I> {
    State(StateData<M, I>),
    Pseudo(PseudoStateKind),
}

pub(crate) struct StateData<M, I> {
    pub(crate) regions: Vec<RegionId>,
    pub(crate) entry: Vec<Action<M, I>>,
    pub(crate) exit: Vec<Action<M, I>>,
    pub(crate) is_final: bool,
}

impl<M, I> StateData<M, I> {
    pub(crate) fn new(is_final: bool) -> Self {
        Self {
            regions: Vec::new(),
            entry: Vec::new(),
            exit: Vec::new(),
            is_final,
        }
    }
}

impl<M, I> VertexNode<M, I> {
    pub(crate) fn state(&self) -> Option<&StateData<M, I>> {
        match &self.kind {
            VertexKind::State(data) => Some(data),
            VertexKind::Pseudo(_) => None,
        }
    }

    pub(crate) fn state_mut(&mut self) -> Option<&mut StateData<M, I>> {
        match &mut self.kind {
            VertexKind::State(data) => Some(data),
            VertexKind::Pseudo(_) => None,
        }
    }

    pub(crate) fn pseudo_kind(&self) -> Option<PseudoStateKind> {
        match self.kind {
            VertexKind::State(_) => None,
            VertexKind::Pseudo(kind) => Some(kind),
        }
    }
}

/// Arena node for a transition.
pub(crate) struct TransitionNode<M, I> {
    pub(crate) source: VertexId,
    pub(crate) target: Option<VertexId>,
    pub(crate) kind: TransitionKind,
    pub(crate) guard: Guard<M, I>,
    pub(crate) effect: Vec<Action<M, I>>,
    pub(crate) removed: bool,
}
