//! The graph controller.
//!
//! [`Controller`] owns the element registry, reconciles it against
//! declarative [`Model`] snapshots, resolves behaviors, components and
//! layouts through factory chains, and dispatches structural events.
//!
//! # Reconciliation
//!
//! [`Controller::from_model`] runs as a single transaction:
//!
//! 1. Get or create the graph, every node and then every edge.
//! 2. Merge the graph model, then every other model bottom-up along the
//!    declared `children` lists, so a parent sees already updated children.
//! 3. Remove tracked elements that are absent from the snapshot.
//! 4. Reparent orphans to the graph root.
//! 5. Fire one `element.add` and one `element.remove` event with the full
//!    batches.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    rc::Rc,
};

use indexmap::IndexMap;
use log::{debug, info, trace, warn};
use serde_json::Value;

use trellis_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
    model::{EdgeModel, ElementModel, GraphModel, Model, NodeModel},
};

use crate::{
    component::{self, Component, GROUP_TYPE},
    config::{AppConfig, DispatchPolicy},
    element::{
        ChildSnapshot, DefaultBehavior, Element, ElementBehavior, ElementKey, ElementKind,
        GroupBehavior,
    },
    error::{Error, Result},
    event::{
        ELEMENT_ADD, ELEMENT_CHANGE, ELEMENT_REMOVE, Event, EventBus, ListenerId, ListenerResult,
    },
    factory::{ComponentFactory, ElementFactory, FactoryChain, LayoutFactory},
    graph::{GraphMut, GraphState},
    layout::{Layout, LayoutEdge, LayoutGraph, LayoutNode, engines},
    transaction::{PendingBatch, Transaction},
};

/// A node or edge model of the snapshot being reconciled.
#[derive(Clone, Copy)]
enum KindModel<'a> {
    Node(&'a NodeModel),
    Edge(&'a EdgeModel),
}

impl KindModel<'_> {
    fn element(&self) -> &ElementModel {
        match self {
            Self::Node(model) => &model.element,
            Self::Edge(model) => &model.element,
        }
    }
}

/// Revision of every tracked element, keyed by id.
type Revisions = HashMap<Id, (ElementKey, u64)>;

/// Renderer-independent graph controller.
///
/// # Examples
///
/// ```
/// use trellis::{Controller, model::{GraphModel, Model, NodeModel}};
///
/// let mut controller = Controller::default();
/// controller
///     .from_model(&Model::new()
///         .with_graph(GraphModel::new("g", "graph"))
///         .with_nodes(vec![NodeModel::new("n1", "node").with_size(10.0, 10.0)]))
///     .unwrap();
///
/// assert!(controller.get_node_by_id("n1".into()).is_some());
/// assert_eq!(controller.graph_mut().unwrap().nodes().count(), 1);
/// ```
pub struct Controller {
    config: AppConfig,
    elements: IndexMap<Id, Element>,
    graph: Option<Id>,
    store: IndexMap<String, Value>,
    element_factories: FactoryChain<ElementFactory>,
    component_factories: FactoryChain<ComponentFactory>,
    layout_factories: FactoryChain<LayoutFactory>,
    bus: EventBus,
    in_transaction: bool,
    pending: PendingBatch,
}

impl Controller {
    /// Creates a controller with the built-in element, component and layout
    /// factories registered.
    pub fn new(config: AppConfig) -> Self {
        let mut element_factories = FactoryChain::<ElementFactory>::new();
        let padding = config.layout().group_padding();
        element_factories.register(Box::new(move |kind: ElementKind, element_type: &str| {
            let behavior: Rc<dyn ElementBehavior> =
                if kind == ElementKind::Node && element_type == GROUP_TYPE {
                    Rc::new(GroupBehavior::new(padding))
                } else {
                    Rc::new(DefaultBehavior::new(padding))
                };
            Some(behavior)
        }));

        let mut component_factories = FactoryChain::<ComponentFactory>::new();
        component::register_defaults(&mut component_factories);

        let mut layout_factories = FactoryChain::<LayoutFactory>::new();
        engines::register_defaults(&mut layout_factories, config.layout());

        Self {
            config,
            elements: IndexMap::new(),
            graph: None,
            store: IndexMap::new(),
            element_factories,
            component_factories,
            layout_factories,
            bus: EventBus::default(),
            in_transaction: false,
            pending: PendingBatch::default(),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Returns `true` while a reconciliation transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Sets the batching flag, returning the previous value.
    pub(crate) fn set_in_transaction(&mut self, in_transaction: bool) -> bool {
        std::mem::replace(&mut self.in_transaction, in_transaction)
    }

    /// Reconciles the element tree against `model`.
    ///
    /// Known ids keep their element instance and receive a partial merge;
    /// unknown ids are created through the element factory chain; tracked
    /// ids missing from the snapshot are removed. Structural events are
    /// fired once, after the tree is consistent again.
    ///
    /// Unknown or cyclic child references and dangling edge endpoints are
    /// tolerated and logged.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidModel`] for an empty id or an id supplied with a
    ///   different kind than the element it names. Nothing is changed.
    /// - [`Error::Configuration`] if the graph model names a layout type no
    ///   factory handles. The rest of the snapshot is still applied.
    /// - [`Error::Listener`] if a listener of the flushed events fails.
    pub fn from_model(&mut self, model: &Model) -> Result<()> {
        info!(
            nodes = model.node_models().count(),
            edges = model.edge_models().count();
            "Reconciling snapshot"
        );
        self.validate(model)?;

        let nested = self.in_transaction;
        let revisions = self
            .config
            .events()
            .notify_changes()
            .then(|| self.revisions());

        let result = {
            let mut txn = Transaction::begin(self);
            txn.reconcile(model)
        };

        if let Some(revisions) = revisions {
            self.pending.changed = self.changed_since(&revisions);
        }
        if nested {
            return result;
        }
        let flushed = self.flush();
        result.and(flushed)
    }

    /// Serializes the live tree into a snapshot.
    ///
    /// Feeding the result back into [`Controller::from_model`] changes
    /// nothing.
    pub fn to_model(&self) -> Model {
        let mut model = Model::new();

        if let Some(graph) = self.graph.and_then(|id| self.elements.get(&id)) {
            let mut graph_model = GraphModel::new(graph.id(), graph.element_type());
            graph_model.element = Self::element_model(graph);
            if let Some(state) = graph.as_graph() {
                let bounds = state.bounds();
                graph_model.layout = state.layout_type().map(str::to_string);
                graph_model.scale = Some(state.scale());
                graph_model.x = Some(bounds.min_x());
                graph_model.y = Some(bounds.min_y());
                graph_model.width = Some(bounds.width());
                graph_model.height = Some(bounds.height());
            }
            model = model.with_graph(graph_model);
        }

        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        for element in self.elements.values() {
            match element.kind() {
                ElementKind::Graph => {}
                ElementKind::Node => {
                    let mut node = NodeModel::new(element.id(), element.element_type());
                    node.element = Self::element_model(element);
                    if let Some(state) = element.as_node() {
                        let bounds = state.bounds();
                        node.x = Some(bounds.min_x());
                        node.y = Some(bounds.min_y());
                        node.width = Some(bounds.width());
                        node.height = Some(bounds.height());
                        node.group = state.is_group().then_some(true);
                    }
                    nodes.push(node);
                }
                ElementKind::Edge => {
                    let mut edge = EdgeModel::new(element.id(), element.element_type());
                    edge.element = Self::element_model(element);
                    if let Some(state) = element.as_edge() {
                        edge.source = state.source();
                        edge.target = state.target();
                        edge.bendpoints = (!state.bendpoints().is_empty())
                            .then(|| state.bendpoints().to_vec());
                    }
                    edges.push(edge);
                }
            }
        }

        model.with_nodes(nodes).with_edges(edges)
    }

    fn element_model(element: &Element) -> ElementModel {
        let mut model = ElementModel::new(element.id(), element.element_type());
        model.children = (!element.children().is_empty()).then(|| element.children().to_vec());
        model.data = element.data().cloned();
        model.label = element.label().map(str::to_string);
        model
    }

    /// Returns the graph root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no graph has been set.
    pub fn get_graph(&self) -> Result<&Element> {
        self.graph
            .and_then(|id| self.elements.get(&id))
            .ok_or_else(Self::no_graph)
    }

    /// Returns a mutable handle to the graph root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no graph has been set.
    pub fn graph_mut(&mut self) -> Result<GraphMut<'_>> {
        let id = self.get_graph()?.id();
        Ok(GraphMut::new(self, id))
    }

    pub fn graph_id(&self) -> Option<Id> {
        self.graph
    }

    pub fn get_element_by_id(&self, id: Id) -> Option<&Element> {
        self.elements.get(&id)
    }

    /// Looks up a node. Returns `None` if `id` names another kind.
    pub fn get_node_by_id(&self, id: Id) -> Option<&Element> {
        self.get_of_kind(id, ElementKind::Node)
    }

    /// Looks up an edge. Returns `None` if `id` names another kind.
    pub fn get_edge_by_id(&self, id: Id) -> Option<&Element> {
        self.get_of_kind(id, ElementKind::Edge)
    }

    fn get_of_kind(&self, id: Id, kind: ElementKind) -> Option<&Element> {
        self.elements.get(&id).filter(|element| element.kind() == kind)
    }

    /// All tracked elements in creation order.
    pub fn elements(&self) -> impl ExactSizeIterator<Item = &Element> {
        self.elements.values()
    }

    /// Auxiliary key/value store owned by the controller.
    pub fn store(&self) -> &IndexMap<String, Value> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut IndexMap<String, Value> {
        &mut self.store
    }

    /// Source node of an edge, or `None` if the edge is dangling.
    pub fn edge_source(&self, edge: Id) -> Option<&Element> {
        let source = self.get_edge_by_id(edge)?.as_edge()?.source()?;
        self.get_node_by_id(source)
    }

    /// Target node of an edge, or `None` if the edge is dangling.
    pub fn edge_target(&self, edge: Id) -> Option<&Element> {
        let target = self.get_edge_by_id(edge)?.as_edge()?.target()?;
        self.get_node_by_id(target)
    }

    /// Starts tracking `element`.
    ///
    /// A graph element becomes the root. Outside a transaction the
    /// `element.add` event fires immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::DuplicateId`] if the id is already tracked.
    /// - [`Error::InvalidModel`] if the id is empty.
    /// - [`Error::Configuration`] if `element` is a graph and a root exists.
    pub fn add_element(&mut self, mut element: Element) -> Result<Id> {
        let id = element.id();
        if id.is_empty() {
            return Err(Error::InvalidModel(format!(
                "{} element without an id",
                element.kind()
            )));
        }
        if self.elements.contains_key(&id) {
            return Err(Error::DuplicateId(id));
        }
        if element.kind() == ElementKind::Graph {
            if let Some(current) = self.graph {
                return Err(Error::Configuration(format!(
                    "graph `{current}` is already set"
                )));
            }
            self.graph = Some(id);
        }

        element.reset_links();
        element.set_attached(true);
        debug!(
            id = id.to_string(),
            kind = element.kind().as_str(),
            key = element.key().to_string();
            "Added element"
        );
        self.elements.insert(id, element);

        if self.in_transaction {
            self.pending.added.push(id);
        } else {
            self.fire_event(ELEMENT_ADD, Event::Added(vec![id]))?;
        }
        Ok(id)
    }

    /// Stops tracking the element `id`.
    ///
    /// The element is detached from its parent; its children are orphaned,
    /// not removed. Removing the graph root also unbinds its layout. Outside
    /// a transaction the `element.remove` event fires immediately with the
    /// detached element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `id` is not tracked.
    pub fn remove_element(&mut self, id: Id) -> Result<()> {
        let element = self.elements.get(&id).ok_or(Error::NotFound(id))?;
        let parent = element.parent();
        let children = element.children().to_vec();

        if let Some(parent) = parent.and_then(|parent| self.elements.get_mut(&parent)) {
            parent.remove_child(id);
        }
        for child in children {
            if let Some(child) = self.elements.get_mut(&child) {
                if child.parent() == Some(id) {
                    child.set_parent(None);
                }
            }
        }
        if self.graph == Some(id) {
            if let Some(state) = self.graph_state_mut() {
                state.unbind_layout();
            }
            self.graph = None;
        }

        let mut element = self.elements.shift_remove(&id).ok_or(Error::NotFound(id))?;
        element.reset_links();
        element.set_attached(false);
        debug!(
            id = id.to_string(),
            kind = element.kind().as_str();
            "Removed element"
        );

        if self.in_transaction {
            self.pending.removed.push(element);
            Ok(())
        } else {
            self.fire_event(ELEMENT_REMOVE, Event::Removed(vec![element]))
        }
    }

    /// Makes `child` the last child of `parent`, detaching it from its
    /// previous parent.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if either id is not tracked.
    /// - [`Error::InvalidModel`] if the link would put the graph under
    ///   another element, put anything under an edge, or create a cycle.
    pub fn append_child(&mut self, parent: Id, child: Id) -> Result<()> {
        for id in [parent, child] {
            if !self.elements.contains_key(&id) {
                return Err(Error::NotFound(id));
            }
        }
        if let Err(reason) = self.check_attach(parent, child) {
            warn!(
                parent = parent.to_string(),
                child = child.to_string(),
                reason;
                "Refusing to attach child"
            );
            return Err(Error::InvalidModel(format!(
                "cannot attach `{child}` to `{parent}`: {reason}"
            )));
        }
        self.attach(parent, child);
        Ok(())
    }

    /// Detaches `child` from its parent. The element stays tracked and is
    /// reparented to the graph by the next reconciliation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `child` is not tracked.
    pub fn detach(&mut self, child: Id) -> Result<()> {
        let parent = self
            .elements
            .get(&child)
            .ok_or(Error::NotFound(child))?
            .parent();
        if let Some(parent) = parent.and_then(|parent| self.elements.get_mut(&parent)) {
            parent.remove_child(child);
        }
        if let Some(element) = self.elements.get_mut(&child) {
            element.set_parent(None);
        }
        Ok(())
    }

    /// Registers an element factory ahead of all existing ones.
    pub fn register_element_factory<F>(&mut self, factory: F)
    where
        F: Fn(ElementKind, &str) -> Option<Rc<dyn ElementBehavior>> + 'static,
    {
        self.element_factories.register(Box::new(factory));
    }

    /// Registers a component factory ahead of all existing ones.
    pub fn register_component_factory<F>(&mut self, factory: F)
    where
        F: Fn(ElementKind, &str) -> Option<Rc<dyn Component>> + 'static,
    {
        self.component_factories.register(Box::new(factory));
    }

    /// Registers a layout factory ahead of all existing ones.
    pub fn register_layout_factory<F>(&mut self, factory: F)
    where
        F: Fn(&str, &LayoutGraph) -> Option<Box<dyn Layout>> + 'static,
    {
        self.layout_factories.register(Box::new(factory));
    }

    /// Resolves the component for an element kind and type.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no factory matches.
    pub fn get_component(&self, kind: ElementKind, element_type: &str) -> Result<Rc<dyn Component>> {
        self.component_factories
            .resolve(|factory| factory(kind, element_type))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no component registered for {kind} type `{element_type}`"
                ))
            })
    }

    /// Resolves a layout for `layout_type` and binds it to the graph,
    /// replacing the current one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if no graph is set or no factory
    /// handles the type.
    pub fn get_layout(&mut self, layout_type: &str) -> Result<()> {
        let graph = self.layout_graph()?;
        let layout = self
            .layout_factories
            .resolve(|factory| factory(layout_type, &graph))
            .ok_or_else(|| {
                Error::Configuration(format!("no layout registered for type `{layout_type}`"))
            })?;

        self.update_graph(|state| {
            state.bind_layout(layout_type.to_string(), layout);
            true
        });
        debug!(layout = layout_type; "Bound layout");
        Ok(())
    }

    /// Subscribes `listener` to `event_type`.
    pub fn add_event_listener<F>(&mut self, event_type: &str, listener: F) -> ListenerId
    where
        F: FnMut(&mut Controller, &Event) -> ListenerResult + 'static,
    {
        self.bus.add(event_type, Box::new(listener))
    }

    /// Unsubscribes a listener. Returns `false` if it was not subscribed to
    /// `event_type`.
    pub fn remove_event_listener(&mut self, event_type: &str, id: ListenerId) -> bool {
        self.bus.remove(event_type, id)
    }

    /// Number of listeners subscribed to `event_type`.
    pub fn listener_count(&self, event_type: &str) -> usize {
        self.bus.count(event_type)
    }

    /// Invokes the listeners of `event_type` in registration order.
    ///
    /// A listener that is still running further up the stack is skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Listener`] with the first listener failure. Under
    /// [`DispatchPolicy::FailFast`] the remaining listeners are not invoked.
    pub fn fire_event(&mut self, event_type: &str, event: Event) -> Result<()> {
        if !self.bus.has_listeners(event_type) {
            trace!(event = event_type; "No listeners");
            return Ok(());
        }
        let listeners = self.bus.snapshot(event_type);
        debug!(
            event = event_type,
            listeners = listeners.len(),
            elements = event.len();
            "Dispatching event"
        );

        let policy = self.config.events().dispatch();
        let mut first_error = None;
        for (id, listener) in listeners {
            let Ok(mut callback) = listener.try_borrow_mut() else {
                warn!(event = event_type, listener = id.to_string(); "Skipping re-entered listener");
                continue;
            };
            if let Err(err) = (*callback)(self, &event) {
                match policy {
                    DispatchPolicy::FailFast => return Err(err.into()),
                    DispatchPolicy::Isolate => {
                        warn!(
                            event = event_type,
                            listener = id.to_string(),
                            err:err;
                            "Listener failed"
                        );
                        first_error.get_or_insert(err);
                    }
                }
            }
        }

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Tracked children of `id` of the given kind, in child order.
    pub(crate) fn children_of_kind(
        &self,
        id: Id,
        kind: ElementKind,
    ) -> impl Iterator<Item = &Element> + '_ {
        self.elements
            .get(&id)
            .into_iter()
            .flat_map(|element| element.children().iter())
            .filter_map(move |child| self.elements.get(child))
            .filter(move |element| element.kind() == kind)
    }

    /// Union of the bounds of every node below `id`.
    pub(crate) fn content_bounds(&self, id: Id) -> Option<Bounds> {
        self.descendants(id)
            .into_iter()
            .filter_map(|id| self.get_node_by_id(id))
            .filter_map(Element::bounds)
            .reduce(|acc, bounds| acc.merge(&bounds))
    }

    /// Applies `update` to the graph state. The graph's revision is bumped
    /// if `update` reports a change.
    pub(crate) fn update_graph(&mut self, update: impl FnOnce(&mut GraphState) -> bool) -> bool {
        let Some(element) = self.graph.and_then(|id| self.elements.get_mut(&id)) else {
            return false;
        };
        let changed = element.graph_state_mut().is_some_and(update);
        if changed {
            element.touch();
        }
        changed
    }

    fn graph_state_mut(&mut self) -> Option<&mut GraphState> {
        let id = self.graph?;
        self.elements.get_mut(&id)?.graph_state_mut()
    }

    /// Binds the layout for `layout_type` to the graph.
    ///
    /// Requesting the bound type again does nothing. `None` or an empty type
    /// unbinds. The previous layout is destroyed before the new one is
    /// resolved, so a failed resolution leaves the graph without a layout.
    pub(crate) fn set_graph_layout(&mut self, layout_type: Option<&str>) -> Result<()> {
        let current = self
            .get_graph()?
            .as_graph()
            .and_then(GraphState::layout_type)
            .map(str::to_string);
        let requested = layout_type.filter(|layout_type| !layout_type.is_empty());
        if current.as_deref() == requested {
            trace!(layout = requested; "Layout unchanged");
            return Ok(());
        }

        if current.is_some() {
            self.update_graph(|state| {
                state.unbind_layout();
                true
            });
            debug!(layout = current.as_deref(); "Unbound layout");
        }
        match requested {
            Some(layout_type) => self.get_layout(layout_type),
            None => Ok(()),
        }
    }

    /// Runs the bound layout and writes the positions back. Descendants of
    /// a moved node move by the same amount, and group bounds are refreshed
    /// afterwards.
    pub(crate) fn run_layout(&mut self) -> Result<()> {
        let graph_id = self.get_graph()?.id();
        let Some(mut layout) = self.graph_state_mut().and_then(GraphState::take_layout) else {
            debug!("No layout bound, keeping positions");
            return Ok(());
        };

        let result = self.layout_graph().and_then(|mut graph| {
            layout.layout(&mut graph)?;
            Ok(graph)
        });
        if let Some(state) = self.graph_state_mut() {
            state.restore_layout(layout);
        }
        let graph = result?;

        let mut moved = 0;
        for node in graph.nodes() {
            let Some(current) = self.get_node_by_id(node.id()).and_then(Element::bounds) else {
                continue;
            };
            let delta = node.position().sub_point(current.min_point());
            if delta.is_zero() {
                continue;
            }
            for id in std::iter::once(node.id()).chain(self.descendants(node.id())) {
                if let Some(element) = self.elements.get_mut(&id) {
                    element.translate(delta);
                }
            }
            moved += 1;
        }
        self.refresh_groups(graph_id);

        info!(nodes = graph.nodes().len(), moved; "Applied layout");
        Ok(())
    }

    /// Builds the layout working copy: direct node children of the graph,
    /// and every edge whose endpoints resolve to two different direct
    /// children (nested endpoints are lifted to their top-level ancestor).
    fn layout_graph(&self) -> Result<LayoutGraph> {
        let graph = self.get_graph()?;
        let graph_id = graph.id();
        let mut layout_graph = LayoutGraph::new(graph.bounds().unwrap_or_default());

        for node in self.children_of_kind(graph_id, ElementKind::Node) {
            layout_graph.add_node(LayoutNode::new(
                node.id(),
                node.bounds().unwrap_or_default(),
                node.is_group(),
            ));
        }

        for edge in self
            .elements
            .values()
            .filter(|element| element.kind() == ElementKind::Edge)
        {
            let (Some(source), Some(target)) =
                (self.edge_source(edge.id()), self.edge_target(edge.id()))
            else {
                continue;
            };
            let (Some(source), Some(target)) = (
                self.top_level_ancestor(source.id(), graph_id),
                self.top_level_ancestor(target.id(), graph_id),
            ) else {
                continue;
            };
            if source != target {
                layout_graph.add_edge(LayoutEdge::new(edge.id(), source, target));
            }
        }

        Ok(layout_graph)
    }

    /// The ancestor of `id` (or `id` itself) that is a direct child of the
    /// graph.
    fn top_level_ancestor(&self, id: Id, graph_id: Id) -> Option<Id> {
        let mut current = id;
        for _ in 0..self.elements.len() {
            match self.elements.get(&current)?.parent()? {
                parent if parent == graph_id => return Some(current),
                parent => current = parent,
            }
        }
        None
    }

    /// Every element below `id`, depth first.
    fn descendants(&self, id: Id) -> Vec<Id> {
        let mut result = Vec::new();
        let mut visited = HashSet::from([id]);
        let mut stack: Vec<Id> = self
            .elements
            .get(&id)
            .map(|element| element.children().iter().rev().copied().collect())
            .unwrap_or_default();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            result.push(current);
            if let Some(element) = self.elements.get(&current) {
                stack.extend(element.children().iter().rev().copied());
            }
        }
        result
    }

    /// Calls `children_changed` on every group below `id`, innermost first.
    fn refresh_groups(&mut self, id: Id) {
        let mut groups: Vec<Id> = self
            .descendants(id)
            .into_iter()
            .filter(|id| self.elements.get(id).is_some_and(Element::is_group))
            .collect();
        groups.reverse();

        for group in groups {
            let snapshots = self.child_snapshots(group);
            if let Some(element) = self.elements.get_mut(&group) {
                let behavior = element.behavior();
                behavior.children_changed(element, &snapshots);
            }
        }
    }

    fn child_snapshots(&self, id: Id) -> Vec<ChildSnapshot> {
        self.elements
            .get(&id)
            .into_iter()
            .flat_map(|element| element.children().iter())
            .filter_map(|child| self.elements.get(child))
            .map(|child| ChildSnapshot {
                id: child.id(),
                kind: child.kind(),
                bounds: child.as_node().map(|node| node.bounds()),
            })
            .collect()
    }

    /// Checks that `child` may be attached under `parent`.
    fn check_attach(&self, parent: Id, child: Id) -> std::result::Result<(), &'static str> {
        if !self.elements.contains_key(&child) {
            return Err("unknown child");
        }
        if parent == child {
            return Err("an element cannot own itself");
        }
        if self.graph == Some(child) {
            return Err("the graph cannot be a child");
        }
        if self
            .elements
            .get(&parent)
            .is_some_and(|element| element.kind() == ElementKind::Edge)
        {
            return Err("edges cannot own children");
        }
        if self.is_ancestor(child, parent) {
            return Err("the link would create a cycle");
        }
        Ok(())
    }

    /// Returns `true` if `ancestor` is on the parent chain of `id`.
    fn is_ancestor(&self, ancestor: Id, id: Id) -> bool {
        let mut current = self.elements.get(&id).and_then(Element::parent);
        let mut steps = 0;
        while let Some(parent) = current {
            if parent == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.elements.len() {
                return false;
            }
            current = self.elements.get(&parent).and_then(Element::parent);
        }
        false
    }

    /// Links `child` under `parent` without safety checks.
    fn attach(&mut self, parent: Id, child: Id) {
        let previous = self.elements.get(&child).and_then(Element::parent);
        if previous == Some(parent) {
            return;
        }
        if let Some(previous) = previous.and_then(|previous| self.elements.get_mut(&previous)) {
            previous.remove_child(child);
        }
        if let Some(parent) = self.elements.get_mut(&parent) {
            parent.push_child(child);
        }
        if let Some(element) = self.elements.get_mut(&child) {
            element.set_parent(Some(parent));
        }
    }

    /// Replaces the children of `parent` with the accepted part of
    /// `requested`. Refused references are dropped with a warning.
    fn merge_children(&mut self, parent: Id, requested: &[Id]) {
        let mut accepted: Vec<Id> = Vec::with_capacity(requested.len());
        let mut seen: HashSet<Id> = HashSet::with_capacity(requested.len());
        for &child in requested {
            if !seen.insert(child) {
                continue;
            }
            match self.check_attach(parent, child) {
                Ok(()) => accepted.push(child),
                Err(reason) => warn!(
                    parent = parent.to_string(),
                    child = child.to_string(),
                    reason;
                    "Dropping child reference"
                ),
            }
        }

        let previous: Vec<Id> = self
            .elements
            .get(&parent)
            .map(|element| element.children().to_vec())
            .unwrap_or_default();
        let kept: HashSet<Id> = accepted.iter().copied().collect();
        for old in previous.iter().filter(|id| !kept.contains(*id)) {
            if let Some(element) = self.elements.get_mut(old) {
                if element.parent() == Some(parent) {
                    element.set_parent(None);
                }
            }
        }

        for &child in &accepted {
            let old_parent = self
                .elements
                .get(&child)
                .and_then(Element::parent)
                .filter(|old| *old != parent);
            if let Some(old_parent) = old_parent.and_then(|old| self.elements.get_mut(&old)) {
                old_parent.remove_child(child);
            }
            if let Some(element) = self.elements.get_mut(&child) {
                element.set_parent(Some(parent));
            }
        }

        if let Some(element) = self.elements.get_mut(&parent) {
            element.set_children(accepted);
        }
    }

    fn no_graph() -> Error {
        Error::Configuration("no graph has been set".to_string())
    }

    /// Rejects snapshots that cannot be reconciled at all.
    fn validate(&self, model: &Model) -> Result<()> {
        let entries = model
            .graph
            .iter()
            .map(|graph| (&graph.element, ElementKind::Graph))
            .chain(
                model
                    .node_models()
                    .map(|node| (&node.element, ElementKind::Node)),
            )
            .chain(
                model
                    .edge_models()
                    .map(|edge| (&edge.element, ElementKind::Edge)),
            );

        let mut kinds: HashMap<Id, ElementKind> = HashMap::new();
        for (element, kind) in entries {
            let id = element.id;
            if id.is_empty() {
                return Err(Error::InvalidModel(format!("{kind} model without an id")));
            }
            if let Some(other) = kinds.insert(id, kind).filter(|other| *other != kind) {
                return Err(Error::InvalidModel(format!(
                    "id `{id}` is used by both a {other} and a {kind} model"
                )));
            }
            if let Some(tracked) = self.elements.get(&id).filter(|tracked| tracked.kind() != kind) {
                return Err(Error::InvalidModel(format!(
                    "id `{id}` names a {} but is supplied as a {kind}",
                    tracked.kind()
                )));
            }
        }
        Ok(())
    }

    fn reconcile(&mut self, model: &Model) -> Result<()> {
        let mut valid: HashSet<Id> = HashSet::new();

        let graph_created = match &model.graph {
            Some(graph) => {
                valid.insert(graph.element.id);
                self.materialize_graph(graph)?
            }
            None => false,
        };
        for node in model.node_models() {
            self.get_or_create(&node.element, ElementKind::Node)?;
            valid.insert(node.element.id);
        }
        for edge in model.edge_models() {
            self.get_or_create(&edge.element, ElementKind::Edge)?;
            valid.insert(edge.element.id);
        }

        if let Some(graph) = &model.graph {
            self.apply_graph_model(graph);
        }

        let mut models: IndexMap<Id, KindModel<'_>> = IndexMap::new();
        for node in model.node_models() {
            models
                .entry(node.element.id)
                .or_insert(KindModel::Node(node));
        }
        for edge in model.edge_models() {
            models
                .entry(edge.element.id)
                .or_insert(KindModel::Edge(edge));
        }
        let mut processed = HashSet::new();
        let order: Vec<Id> = models.keys().copied().collect();
        for id in order {
            self.apply_bottom_up(id, &models, &mut processed);
        }

        self.prune(&valid)?;
        self.reparent_orphans();
        self.warn_dangling_edges();

        match &model.graph {
            Some(graph) => self.bind_snapshot_layout(graph, graph_created),
            None => Ok(()),
        }
    }

    /// Gets or creates the graph root named by `model`, replacing a root
    /// with a different id. Returns `true` if the graph was created.
    fn materialize_graph(&mut self, model: &GraphModel) -> Result<bool> {
        let id = model.element.id;
        if let Some(current) = self.graph.filter(|current| *current != id) {
            info!(old = current.to_string(), new = id.to_string(); "Replacing graph root");
            self.remove_element(current)?;
        }
        if self.elements.contains_key(&id) {
            self.warn_type_change(&model.element);
            return Ok(false);
        }

        let mut element = self.create_element(&model.element, ElementKind::Graph)?;
        let size = self.config.viewport().size();
        if let Some(state) = element.graph_state_mut() {
            state.set_dimensions(size);
        }
        self.add_element(element)?;
        Ok(true)
    }

    fn get_or_create(&mut self, model: &ElementModel, kind: ElementKind) -> Result<()> {
        if self.elements.contains_key(&model.id) {
            self.warn_type_change(model);
            return Ok(());
        }
        let element = self.create_element(model, kind)?;
        self.add_element(element)?;
        Ok(())
    }

    fn create_element(&self, model: &ElementModel, kind: ElementKind) -> Result<Element> {
        let behavior = self
            .element_factories
            .resolve(|factory| factory(kind, &model.element_type))
            .ok_or_else(|| {
                Error::Configuration(format!(
                    "no element factory for {kind} type `{}`",
                    model.element_type
                ))
            })?;
        Ok(Element::new(
            model.id,
            kind,
            model.element_type.clone(),
            behavior,
        ))
    }

    fn warn_type_change(&self, model: &ElementModel) {
        if let Some(element) = self
            .elements
            .get(&model.id)
            .filter(|element| element.element_type() != model.element_type)
        {
            warn!(
                id = model.id.to_string(),
                current = element.element_type(),
                requested = model.element_type.as_str();
                "Ignoring type change of existing element"
            );
        }
    }

    fn apply_graph_model(&mut self, model: &GraphModel) {
        let id = model.element.id;
        if let Some(children) = &model.element.children {
            self.merge_children(id, children);
        }

        let Some(element) = self.elements.get_mut(&id) else {
            return;
        };
        element.merge_element_model(&model.element);

        let changed = element.graph_state_mut().is_some_and(|state| {
            let mut changed = false;
            if let Some(scale) = model.scale {
                changed |= state.set_scale(scale);
            }
            if model.x.is_some() || model.y.is_some() {
                let origin = state.origin();
                changed |= state.set_origin(Point::new(
                    model.x.unwrap_or(origin.x()),
                    model.y.unwrap_or(origin.y()),
                ));
            }
            if model.width.is_some() || model.height.is_some() {
                let size = state.viewport_size();
                changed |= state.set_dimensions(Size::new(
                    model.width.unwrap_or(size.width()),
                    model.height.unwrap_or(size.height()),
                ));
            }
            changed
        });
        if changed {
            trace!(id = id.to_string(); "Merged graph viewport");
            element.touch();
        }
    }

    /// Binds the layout named by the graph model, or the configured default
    /// for a graph created by this snapshot.
    fn bind_snapshot_layout(&mut self, model: &GraphModel, created: bool) -> Result<()> {
        match &model.layout {
            Some(layout_type) => self.set_graph_layout(Some(layout_type)),
            None if created => match self.config.layout().default_layout().map(str::to_string) {
                Some(layout_type) => self.set_graph_layout(Some(&layout_type)),
                None => Ok(()),
            },
            None => Ok(()),
        }
    }

    /// Applies the model of `id` after those of its listed children, in
    /// post order. Ids already in `processed` are skipped.
    fn apply_bottom_up(
        &mut self,
        id: Id,
        models: &IndexMap<Id, KindModel<'_>>,
        processed: &mut HashSet<Id>,
    ) {
        // `true` marks an element whose children have been applied.
        let mut stack = vec![(id, false)];
        while let Some((current, children_done)) = stack.pop() {
            let Some(model) = models.get(&current).copied() else {
                continue;
            };
            if children_done {
                self.apply_model(model);
                continue;
            }
            if !processed.insert(current) {
                continue;
            }
            stack.push((current, true));
            if let Some(children) = &model.element().children {
                stack.extend(children.iter().rev().map(|child| (*child, false)));
            }
        }
    }

    fn apply_model(&mut self, model: KindModel<'_>) {
        let id = model.element().id;
        if let Some(children) = &model.element().children {
            self.merge_children(id, children);
        }

        let snapshots = self.child_snapshots(id);
        let Some(element) = self.elements.get_mut(&id) else {
            return;
        };
        element.merge_element_model(model.element());
        match model {
            KindModel::Node(node) => element.merge_node_model(node),
            KindModel::Edge(edge) => element.merge_edge_model(edge),
        }
        let behavior = element.behavior();
        behavior.model_applied(element, &snapshots);
        trace!(id = id.to_string(); "Applied model");
    }

    fn prune(&mut self, valid: &HashSet<Id>) -> Result<()> {
        let stale: Vec<Id> = self
            .elements
            .keys()
            .filter(|id| !valid.contains(*id) && self.graph != Some(**id))
            .copied()
            .collect();
        for id in stale {
            self.remove_element(id)?;
        }
        Ok(())
    }

    fn reparent_orphans(&mut self) {
        let Some(graph_id) = self.graph else {
            return;
        };
        let orphans: Vec<Id> = self
            .elements
            .values()
            .filter(|element| element.kind() != ElementKind::Graph && element.parent().is_none())
            .map(Element::id)
            .collect();
        if orphans.is_empty() {
            return;
        }

        for id in &orphans {
            self.attach(graph_id, *id);
        }
        debug!(count = orphans.len(); "Reparented orphans to graph");
    }

    fn warn_dangling_edges(&self) {
        for edge in self
            .elements
            .values()
            .filter(|element| element.kind() == ElementKind::Edge)
        {
            let id = edge.id();
            if self.edge_source(id).is_none() || self.edge_target(id).is_none() {
                warn!(id = id.to_string(); "Edge endpoint does not resolve to a node");
            }
        }
    }

    fn revisions(&self) -> Revisions {
        self.elements
            .values()
            .map(|element| (element.id(), (element.key(), element.revision())))
            .collect()
    }

    /// Ids of elements that existed in `before` and were mutated since.
    fn changed_since(&self, before: &Revisions) -> Vec<Id> {
        self.elements
            .values()
            .filter(|element| {
                before
                    .get(&element.id())
                    .is_some_and(|(key, revision)| {
                        *key == element.key() && *revision != element.revision()
                    })
            })
            .map(Element::id)
            .collect()
    }

    /// Fires the pending batches. The batch is moved out first, so
    /// listeners that mutate the controller start a fresh one.
    fn flush(&mut self) -> Result<()> {
        let batch = std::mem::take(&mut self.pending);
        if batch.is_empty() {
            debug!("Committed transaction without structural changes");
            return Ok(());
        }
        let PendingBatch {
            added,
            removed,
            changed,
        } = batch;
        info!(
            added = added.len(),
            removed = removed.len(),
            changed = changed.len();
            "Committed transaction"
        );

        let mut results = Vec::with_capacity(3);
        if !added.is_empty() {
            results.push(self.fire_event(ELEMENT_ADD, Event::Added(added)));
        }
        if !removed.is_empty() {
            results.push(self.fire_event(ELEMENT_REMOVE, Event::Removed(removed)));
        }
        if !changed.is_empty() {
            results.push(self.fire_event(ELEMENT_CHANGE, Event::Changed(changed)));
        }
        results.into_iter().collect()
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("graph", &self.graph)
            .field("elements", &self.elements.len())
            .field("listeners", &self.bus)
            .field("element_factories", &self.element_factories.len())
            .field("component_factories", &self.component_factories.len())
            .field("layout_factories", &self.layout_factories.len())
            .field("in_transaction", &self.in_transaction)
            .finish_non_exhaustive()
    }
}
