//! The state machine: arena, authoring API, and execution façade.
//!
//! A [`StateMachine`] owns every node of one model. Authoring calls link new
//! nodes into their parent's collection and mark the machine dirty; the first
//! initialisation (or dispatch) after a mutation re-runs the compiler. The
//! machine is generic over the message type `M` and the instance type `I`,
//! so guards and actions are statically typed against both.

pub(crate) mod compiler;
pub mod error;
pub(crate) mod evaluator;
pub(crate) mod plan;

use std::fmt;

use rand::Rng;
use tracing::debug;

use crate::builder::TransitionBuilder;
use crate::core::element::{
    Element, PseudoStateKind, RegionId, RegionNode, StateData, StateId, TransitionId,
    TransitionKind, TransitionNode, VertexId, VertexKind, VertexNode,
};
use crate::core::guard::Guard;
use crate::core::instance::{DefaultInstance, Instance};
use crate::core::tree;
use error::{ModelError, SemanticError};
use plan::Compiled;

/// Per-machine knobs, with process-sensible defaults.
///
/// These were traditionally process-wide globals; carrying them on the
/// machine keeps models with different conventions from interfering.
pub struct Settings {
    /// Separator between ancestor names in qualified names.
    pub namespace_separator: String,
    /// Name given to lazily synthesised default regions.
    pub default_region_name: String,
    /// Whether an internal transition re-evaluates its source state's
    /// completion after running its effects.
    pub internal_transitions_trigger_completion: bool,
    random: Box<dyn Fn(usize) -> usize + Send + Sync>,
}

impl Settings {
    /// Replaces the random source used by choice pseudo states.
    ///
    /// `random(max)` must return a value in `[0, max)`. Seeding this with a
    /// deterministic function makes choice selection reproducible in tests.
    pub fn set_random<F>(&mut self, random: F)
    where
        F: Fn(usize) -> usize + Send + Sync + 'static,
    {
        self.random = Box::new(random);
    }

    pub(crate) fn random(&self, max: usize) -> usize {
        (self.random)(max)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            namespace_separator: ".".to_string(),
            default_region_name: "default".to_string(),
            internal_transitions_trigger_completion: false,
            random: Box::new(|max| rand::thread_rng().gen_range(0..max)),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("namespace_separator", &self.namespace_separator)
            .field("default_region_name", &self.default_region_name)
            .field(
                "internal_transitions_trigger_completion",
                &self.internal_transitions_trigger_completion,
            )
            .finish_non_exhaustive()
    }
}

/// Where a new vertex is placed: an explicit region, or a state whose
/// default region is synthesised on first use.
#[derive(Debug, Clone, Copy)]
pub enum VertexParent {
    /// An explicit region.
    Region(RegionId),
    /// A state; the vertex lands in its default region.
    State(StateId),
}

impl From<RegionId> for VertexParent {
    fn from(region: RegionId) -> Self {
        VertexParent::Region(region)
    }
}

impl From<StateId> for VertexParent {
    fn from(state: StateId) -> Self {
        VertexParent::State(state)
    }
}

/// A hierarchical state machine model and its compiled form.
///
/// `M` is the message type dispatched into instances; `I` is the instance
/// type seen by guards and actions.
///
/// # Example
///
/// ```rust
/// use statetree::{DefaultInstance, StateMachine};
///
/// let mut sm: StateMachine<&str> = StateMachine::new("player");
/// let region = sm.region("r", sm.root()).unwrap();
/// let initial = sm
///     .pseudo_state("initial", statetree::PseudoStateKind::Initial, region)
///     .unwrap();
/// let off = sm.state("off", region).unwrap();
/// let on = sm.state("on", region).unwrap();
/// sm.transition(initial, off).unwrap();
/// sm.transition(off, on).unwrap().when(|m, _| m == Some(&"flip"));
/// sm.transition(on, off).unwrap().when(|m, _| m == Some(&"flip"));
///
/// let mut instance = DefaultInstance::new("i");
/// sm.initialise(&mut instance).unwrap();
/// assert!(sm.is_active(off, &instance));
/// assert!(sm.evaluate(&mut instance, &"flip").unwrap());
/// assert!(sm.is_active(on, &instance));
/// ```
pub struct StateMachine<M, I = DefaultInstance> {
    name: String,
    root: StateId,
    pub(crate) vertices: Vec<VertexNode<M, I>>,
    pub(crate) regions: Vec<RegionNode>,
    pub(crate) transitions: Vec<TransitionNode<M, I>>,
    pub(crate) clean: bool,
    pub(crate) compiled: Option<Compiled>,
    settings: Settings,
}

impl<M, I> StateMachine<M, I> {
    /// Creates an empty machine whose root state carries `name`.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let root_vertex = VertexNode {
            name: name.clone(),
            parent: None,
            kind: VertexKind::State(StateData::new(false)),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            removed: false,
        };
        Self {
            name,
            root: StateId(VertexId(0)),
            vertices: vec![root_vertex],
            regions: Vec::new(),
            transitions: Vec::new(),
            clean: false,
            compiled: None,
            settings: Settings::default(),
        }
    }

    /// The machine name (also the root state's name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root state.
    pub fn root(&self) -> StateId {
        self.root
    }

    /// Whether the compiled form matches the model.
    pub fn is_clean(&self) -> bool {
        self.clean
    }

    /// The machine's settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable access to the machine's settings.
    ///
    /// Settings are runtime knobs; changing them does not require a
    /// recompile.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Shorthand for [`Settings::set_random`].
    pub fn set_random<F>(&mut self, random: F)
    where
        F: Fn(usize) -> usize + Send + Sync + 'static,
    {
        self.settings.random = Box::new(random);
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.clean = false;
        self.compiled = None;
    }

    // ---------------------------------------------------------------- authoring

    /// Adds a region under `parent`.
    pub fn region(&mut self, name: impl Into<String>, parent: StateId) -> Result<RegionId, ModelError> {
        if self.vertex_node(parent.vertex()).state().map(|s| s.is_final) == Some(true) {
            return Err(ModelError::RegionUnderFinalState {
                vertex: self.qualified_name(parent),
            });
        }
        let id = RegionId(self.regions.len() as u32);
        self.regions.push(RegionNode {
            name: name.into(),
            parent,
            vertices: Vec::new(),
            removed: false,
        });
        let parent_node = self
            .vertices
            .get_mut(parent.vertex().0 as usize)
            .and_then(|v| v.state_mut());
        if let Some(state) = parent_node {
            state.regions.push(id);
        }
        self.mark_dirty();
        Ok(id)
    }

    /// The default region of `state`, synthesised on first use.
    pub fn default_region(&mut self, state: StateId) -> Result<RegionId, ModelError> {
        let existing = self
            .vertex_node(state.vertex())
            .state()
            .and_then(|data| {
                data.regions
                    .iter()
                    .copied()
                    .find(|r| self.regions[r.0 as usize].name == self.settings.default_region_name)
            });
        match existing {
            Some(region) => Ok(region),
            None => {
                let name = self.settings.default_region_name.clone();
                self.region(name, state)
            }
        }
    }

    fn resolve_parent(&mut self, parent: VertexParent) -> Result<RegionId, ModelError> {
        match parent {
            VertexParent::Region(region) => Ok(region),
            VertexParent::State(state) => self.default_region(state),
        }
    }

    fn add_vertex(
        &mut self,
        name: String,
        parent: RegionId,
        kind: VertexKind<M, I>,
    ) -> VertexId {
        let id = VertexId(self.vertices.len() as u32);
        self.vertices.push(VertexNode {
            name,
            parent: Some(parent),
            kind,
            outgoing: Vec::new(),
            incoming: Vec::new(),
            removed: false,
        });
        self.regions[parent.0 as usize].vertices.push(id);
        self.mark_dirty();
        id
    }

    /// Adds a state under `parent` (a region, or a state's default region).
    pub fn state(
        &mut self,
        name: impl Into<String>,
        parent: impl Into<VertexParent>,
    ) -> Result<StateId, ModelError> {
        let region = self.resolve_parent(parent.into())?;
        let id = self.add_vertex(name.into(), region, VertexKind::State(StateData::new(false)));
        Ok(StateId(id))
    }

    /// Adds a final state under `parent`. Entering it completes the region.
    pub fn final_state(
        &mut self,
        name: impl Into<String>,
        parent: impl Into<VertexParent>,
    ) -> Result<StateId, ModelError> {
        let region = self.resolve_parent(parent.into())?;
        let id = self.add_vertex(name.into(), region, VertexKind::State(StateData::new(true)));
        Ok(StateId(id))
    }

    /// Adds a pseudo state of `kind` under `parent`.
    ///
    /// At most one initial-kind pseudo state may exist per region.
    pub fn pseudo_state(
        &mut self,
        name: impl Into<String>,
        kind: PseudoStateKind,
        parent: impl Into<VertexParent>,
    ) -> Result<VertexId, ModelError> {
        let region = self.resolve_parent(parent.into())?;
        if kind.is_initial() {
            let existing = self.regions[region.0 as usize]
                .vertices
                .iter()
                .copied()
                .find(|v| {
                    self.vertex_node(*v)
                        .pseudo_kind()
                        .map(PseudoStateKind::is_initial)
                        == Some(true)
                });
            if let Some(other) = existing {
                return Err(ModelError::DuplicateInitial {
                    region: self.qualified_name(region),
                    existing: self.vertex_node(other).name.clone(),
                });
            }
        }
        Ok(self.add_vertex(name.into(), region, VertexKind::Pseudo(kind)))
    }

    fn check_transition_source(&self, source: VertexId) -> Result<(), ModelError> {
        let node = self.vertex_node(source);
        if node.removed {
            return Err(ModelError::RemovedElement {
                element: self.qualified_name(source),
            });
        }
        if node.state().map(|s| s.is_final) == Some(true) {
            return Err(ModelError::TransitionFromFinalState {
                vertex: self.qualified_name(source),
            });
        }
        if node.pseudo_kind() == Some(PseudoStateKind::Terminate) {
            return Err(ModelError::TransitionFromTerminate {
                vertex: self.qualified_name(source),
            });
        }
        Ok(())
    }

    fn add_transition(
        &mut self,
        source: VertexId,
        target: Option<VertexId>,
        kind: TransitionKind,
    ) -> TransitionId {
        let id = TransitionId(self.transitions.len() as u32);
        self.transitions.push(TransitionNode {
            source,
            target,
            kind,
            guard: Guard::always(),
            effect: Vec::new(),
            removed: false,
        });
        self.vertices[source.0 as usize].outgoing.push(id);
        if let Some(target) = target {
            self.vertices[target.0 as usize].incoming.push(id);
        }
        self.mark_dirty();
        id
    }

    /// Adds a transition from `source` to `target` and returns a fluent
    /// builder for its guard, effects, and kind.
    ///
    /// The kind defaults to external; see [`TransitionBuilder::local`].
    pub fn transition(
        &mut self,
        source: impl Into<VertexId>,
        target: impl Into<VertexId>,
    ) -> Result<TransitionBuilder<'_, M, I>, ModelError> {
        let source = source.into();
        self.check_transition_source(source)?;
        let id = self.add_transition(source, Some(target.into()), TransitionKind::External);
        Ok(TransitionBuilder::new(self, id))
    }

    /// Adds an internal transition on `source`: effects run without exiting
    /// or entering any state.
    pub fn internal_transition(
        &mut self,
        source: StateId,
    ) -> Result<TransitionBuilder<'_, M, I>, ModelError> {
        self.check_transition_source(source.vertex())?;
        let id = self.add_transition(source.vertex(), None, TransitionKind::Internal);
        Ok(TransitionBuilder::new(self, id))
    }

    /// Appends an entry action to `state`.
    pub fn entry<F>(&mut self, state: StateId, action: F)
    where
        F: Fn(Option<&M>, &mut I) + Send + Sync + 'static,
    {
        if let Some(data) = self.vertices[state.vertex().0 as usize].state_mut() {
            data.entry.push(Box::new(action));
        }
        self.mark_dirty();
    }

    /// Appends an exit action to `state`.
    pub fn exit<F>(&mut self, state: StateId, action: F)
    where
        F: Fn(Option<&M>, &mut I) + Send + Sync + 'static,
    {
        if let Some(data) = self.vertices[state.vertex().0 as usize].state_mut() {
            data.exit.push(Box::new(action));
        }
        self.mark_dirty();
    }

    /// Detaches an element (and its subtree) from the model, along with
    /// every transition touching the subtree.
    pub fn remove(&mut self, element: impl Into<Element>) {
        let mut vertices = Vec::new();
        match element.into() {
            Element::Vertex(vertex) => {
                if let Some(region) = self.vertices[vertex.0 as usize].parent {
                    self.regions[region.0 as usize].vertices.retain(|v| *v != vertex);
                }
                self.collect_subtree(vertex, &mut vertices);
            }
            Element::Region(region) => {
                let parent = self.regions[region.0 as usize].parent;
                if let Some(state) = self.vertices[parent.vertex().0 as usize].state_mut() {
                    state.regions.retain(|r| *r != region);
                }
                self.remove_region_subtree(region, &mut vertices);
            }
        }
        for transition in 0..self.transitions.len() {
            let node = &self.transitions[transition];
            if node.removed {
                continue;
            }
            let touches = vertices.contains(&node.source)
                || node.target.map(|t| vertices.contains(&t)).unwrap_or(false);
            if touches {
                let id = TransitionId(transition as u32);
                let (source, target) = (node.source, node.target);
                self.transitions[transition].removed = true;
                self.vertices[source.0 as usize].outgoing.retain(|t| *t != id);
                if let Some(target) = target {
                    self.vertices[target.0 as usize].incoming.retain(|t| *t != id);
                }
            }
        }
        self.mark_dirty();
    }

    fn collect_subtree(&mut self, vertex: VertexId, out: &mut Vec<VertexId>) {
        out.push(vertex);
        self.vertices[vertex.0 as usize].removed = true;
        let regions = self.vertices[vertex.0 as usize]
            .state()
            .map(|data| data.regions.clone())
            .unwrap_or_default();
        for region in regions {
            self.remove_region_subtree(region, out);
        }
    }

    fn remove_region_subtree(&mut self, region: RegionId, out: &mut Vec<VertexId>) {
        self.regions[region.0 as usize].removed = true;
        let vertices = self.regions[region.0 as usize].vertices.clone();
        for vertex in vertices {
            self.collect_subtree(vertex, out);
        }
    }

    // ---------------------------------------------------------------- inspection

    pub(crate) fn vertex_node(&self, vertex: VertexId) -> &VertexNode<M, I> {
        &self.vertices[vertex.0 as usize]
    }

    pub(crate) fn region_node(&self, region: RegionId) -> &RegionNode {
        &self.regions[region.0 as usize]
    }

    pub(crate) fn transition_node(&self, transition: TransitionId) -> &TransitionNode<M, I> {
        &self.transitions[transition.0 as usize]
    }

    /// The plain name of an element.
    pub fn element_name(&self, element: impl Into<Element>) -> &str {
        match element.into() {
            Element::Region(region) => &self.region_node(region).name,
            Element::Vertex(vertex) => &self.vertex_node(vertex).name,
        }
    }

    /// The parent of an element, or `None` for the root.
    pub fn parent_of(&self, element: impl Into<Element>) -> Option<Element> {
        match element.into() {
            Element::Region(region) => Some(self.region_node(region).parent.into()),
            Element::Vertex(vertex) => self.vertex_node(vertex).parent.map(Element::from),
        }
    }

    /// The element's qualified name: ancestor names joined by the configured
    /// separator. Derived on demand, never stored.
    pub fn qualified_name(&self, element: impl Into<Element>) -> String {
        let path = self.ancestry_of(element.into());
        let names: Vec<&str> = path.iter().map(|e| self.element_name(*e)).collect();
        names.join(&self.settings.namespace_separator)
    }

    pub(crate) fn ancestry_of(&self, element: Element) -> Vec<Element> {
        tree::ancestors(element, |e| self.parent_of(e))
    }

    /// The regions owned by `state`, in declaration order.
    pub fn regions_of(&self, state: StateId) -> &[RegionId] {
        self.vertex_node(state.vertex())
            .state()
            .map(|data| data.regions.as_slice())
            .unwrap_or(&[])
    }

    /// The vertices owned by `region`, in declaration order.
    pub fn vertices_of(&self, region: RegionId) -> &[VertexId] {
        &self.region_node(region).vertices
    }

    /// Outgoing transitions of a vertex, in declaration order.
    pub fn outgoing(&self, vertex: impl Into<VertexId>) -> &[TransitionId] {
        &self.vertex_node(vertex.into()).outgoing
    }

    /// Incoming transitions of a vertex, in declaration order.
    pub fn incoming(&self, vertex: impl Into<VertexId>) -> &[TransitionId] {
        &self.vertex_node(vertex.into()).incoming
    }

    /// The pseudo state kind of a vertex, or `None` for states.
    pub fn pseudo_state_kind(&self, vertex: impl Into<VertexId>) -> Option<PseudoStateKind> {
        self.vertex_node(vertex.into()).pseudo_kind()
    }

    /// Narrows a vertex to a state id if it is a state.
    pub fn as_state(&self, vertex: VertexId) -> Option<StateId> {
        self.vertex_node(vertex)
            .state()
            .map(|_| StateId(vertex))
    }

    /// Whether the vertex is a final state.
    pub fn is_final_state(&self, vertex: impl Into<VertexId>) -> bool {
        self.vertex_node(vertex.into())
            .state()
            .map(|data| data.is_final)
            == Some(true)
    }

    /// Whether the state owns no regions.
    pub fn is_simple(&self, state: StateId) -> bool {
        self.regions_of(state).is_empty()
    }

    /// Whether the state owns exactly one region.
    pub fn is_composite(&self, state: StateId) -> bool {
        self.regions_of(state).len() == 1
    }

    /// Whether the state owns two or more regions active in parallel.
    pub fn is_orthogonal(&self, state: StateId) -> bool {
        self.regions_of(state).len() >= 2
    }

    /// The kind of a transition, after construction-time normalisation.
    pub fn transition_kind(&self, transition: TransitionId) -> TransitionKind {
        self.transition_node(transition).kind
    }

    /// A transition's source vertex.
    pub fn transition_source(&self, transition: TransitionId) -> VertexId {
        self.transition_node(transition).source
    }

    /// A transition's target vertex; `None` for internal transitions.
    pub fn transition_target(&self, transition: TransitionId) -> Option<VertexId> {
        self.transition_node(transition).target
    }

    /// Whether the transition carries the else guard.
    pub fn transition_is_else(&self, transition: TransitionId) -> bool {
        self.transition_node(transition).guard.is_else()
    }

    /// Number of transition slots ever authored, removed ones included.
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Whether the transition is still attached to the model.
    pub fn transition_exists(&self, transition: TransitionId) -> bool {
        self.transitions
            .get(transition.0 as usize)
            .map(|t| !t.removed)
            .unwrap_or(false)
    }
}

impl<M, I: Instance> StateMachine<M, I> {
    /// Compiles the model if it is dirty.
    pub fn initialise_model(&mut self) -> Result<(), ModelError> {
        if !self.clean {
            self.compile()?;
        }
        Ok(())
    }

    /// Compiles the model if needed, clears the instance's terminated flag,
    /// and runs the machine's initialisation cascade against the instance.
    pub fn initialise(&mut self, instance: &mut I) -> Result<(), SemanticError> {
        self.initialise_model()?;
        instance.set_terminated(false);
        debug!(machine = %self.name, "initialise");
        let compiled = self.compiled.as_ref().ok_or(SemanticError::NotInitialised)?;
        self.run_steps(compiled, &compiled.on_initialise, instance, None, false)
    }

    /// Dispatches `message` into `instance`; returns whether it was consumed.
    ///
    /// A terminated instance consumes nothing. A dirty model is recompiled
    /// first (model only; the instance is left as it is).
    pub fn evaluate(&mut self, instance: &mut I, message: &M) -> Result<bool, SemanticError> {
        if instance.is_terminated() {
            return Ok(false);
        }
        self.initialise_model()?;
        let compiled = self.compiled.as_ref().ok_or(SemanticError::NotInitialised)?;
        let consumed = self.evaluate_state(compiled, self.root, instance, message)?;
        debug!(machine = %self.name, consumed, "evaluate");
        Ok(consumed)
    }

    /// Whether `vertex` is part of the instance's active configuration.
    pub fn is_active(&self, vertex: impl Into<VertexId>, instance: &I) -> bool {
        let vertex = vertex.into();
        match self.vertex_node(vertex).parent {
            None => true,
            Some(region) => {
                instance.get_current(region).map(StateId::vertex) == Some(vertex)
                    && self.is_active(self.region_node(region).parent.vertex(), instance)
            }
        }
    }

    /// Whether an element is complete: a region whose current state is a
    /// final state, or a state all of whose regions are complete.
    pub fn is_complete(&self, element: impl Into<Element>, instance: &I) -> bool {
        match element.into() {
            Element::Region(region) => instance
                .get_current(region)
                .map(|state| self.is_final_state(state))
                .unwrap_or(false),
            Element::Vertex(vertex) => match self.as_state(vertex) {
                Some(state) => self
                    .regions_of(state)
                    .iter()
                    .all(|region| self.is_complete(*region, instance)),
                None => false,
            },
        }
    }
}

impl<M, I> fmt::Debug for StateMachine<M, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("name", &self.name)
            .field("vertices", &self.vertices.len())
            .field("regions", &self.regions.len())
            .field("transitions", &self.transitions.len())
            .field("clean", &self.clean)
            .finish()
    }
}
