//! Graph elements tracked by the controller.
//!
//! Every graph, node and edge is an [`Element`]: an identity (id, instance
//! key, type tag), a position in the ownership tree (one parent, ordered
//! children) and a kind-specific body. Elements live in the controller's
//! registry and refer to each other by [`Id`], never by pointer.
//!
//! Kind-specific reactions to model updates are delegated to an
//! [`ElementBehavior`] resolved through the element factory chain. The
//! built-in [`GroupBehavior`] keeps a group node wrapped around its children.

use std::{
    fmt,
    rc::Rc,
    sync::atomic::{AtomicU64, Ordering},
};

use log::trace;
use serde_json::Value;

use trellis_core::{
    geometry::{Bounds, Insets, Point, Size},
    identifier::Id,
    model::{EdgeModel, ElementModel, NodeModel},
};

use crate::graph::GraphState;

/// Padding between a group border and its children when none is configured.
pub const DEFAULT_GROUP_PADDING: f32 = 20.0;

/// Coarse category of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Graph,
    Node,
    Edge,
}

impl ElementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Graph => "graph",
            Self::Node => "node",
            Self::Edge => "edge",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Instance identity of an element.
///
/// Ids are chosen by snapshot producers and may be reused after an element
/// is removed. Keys are handed out once per constructed element, so a
/// recreated id is distinguishable from the instance it replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey(u64);

impl ElementKey {
    fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ElementKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Position and size of a node, in graph coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeState {
    bounds: Bounds,
    group: bool,
}

impl NodeState {
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Top-left corner of the node.
    pub fn position(&self) -> Point {
        self.bounds.min_point()
    }

    pub fn size(&self) -> Size {
        self.bounds.to_size()
    }

    /// Returns `true` if the node wraps its node children.
    pub fn is_group(&self) -> bool {
        self.group
    }
}

/// Endpoints and routing of an edge.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeState {
    source: Option<Id>,
    target: Option<Id>,
    bendpoints: Vec<Point>,
}

impl EdgeState {
    /// Id of the source node, resolved lazily by the controller.
    pub fn source(&self) -> Option<Id> {
        self.source
    }

    pub fn target(&self) -> Option<Id> {
        self.target
    }

    pub fn bendpoints(&self) -> &[Point] {
        &self.bendpoints
    }
}

/// Kind-specific body of an element.
#[derive(Debug)]
pub enum ElementState {
    Graph(GraphState),
    Node(NodeState),
    Edge(EdgeState),
}

impl ElementState {
    fn for_kind(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Graph => Self::Graph(GraphState::default()),
            ElementKind::Node => Self::Node(NodeState::default()),
            ElementKind::Edge => Self::Edge(EdgeState::default()),
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Self::Graph(_) => ElementKind::Graph,
            Self::Node(_) => ElementKind::Node,
            Self::Edge(_) => ElementKind::Edge,
        }
    }
}

/// Read-only summary of a child, handed to [`ElementBehavior`] hooks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChildSnapshot {
    pub id: Id,
    pub kind: ElementKind,
    /// Node bounds; `None` for other kinds.
    pub bounds: Option<Bounds>,
}

/// Kind- and type-specific reactions of an element.
///
/// Behaviors are produced by element factories. Hooks run after the
/// generic model merge and receive summaries of the element's children,
/// which are always up to date because models are applied bottom-up.
pub trait ElementBehavior {
    /// Called after a snapshot model has been merged into `element`.
    fn model_applied(&self, element: &mut Element, children: &[ChildSnapshot]) {
        self.children_changed(element, children);
    }

    /// Called when the geometry of the element's children changed outside a
    /// model merge, for instance after a layout run.
    fn children_changed(&self, _element: &mut Element, _children: &[ChildSnapshot]) {}
}

/// Behavior of plain graph, node and edge elements.
///
/// A node that declares `group: true` in its model still wraps its
/// children.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBehavior {
    group_padding: Insets,
}

impl DefaultBehavior {
    pub fn new(group_padding: f32) -> Self {
        Self {
            group_padding: Insets::uniform(group_padding),
        }
    }
}

impl Default for DefaultBehavior {
    fn default() -> Self {
        Self::new(DEFAULT_GROUP_PADDING)
    }
}

impl ElementBehavior for DefaultBehavior {
    fn children_changed(&self, element: &mut Element, children: &[ChildSnapshot]) {
        if element.is_group() {
            wrap_children(element, children, self.group_padding);
        }
    }
}

/// Behavior of nodes of type `group`.
///
/// The node is always treated as a group: its bounds become the union of
/// its node children's bounds, expanded by the padding.
#[derive(Debug, Clone, Copy)]
pub struct GroupBehavior {
    padding: Insets,
}

impl GroupBehavior {
    pub fn new(padding: f32) -> Self {
        Self {
            padding: Insets::uniform(padding),
        }
    }
}

impl ElementBehavior for GroupBehavior {
    fn model_applied(&self, element: &mut Element, children: &[ChildSnapshot]) {
        if let ElementState::Node(node) = &mut element.state {
            if !node.group {
                node.group = true;
                element.touch();
            }
        }
        self.children_changed(element, children);
    }

    fn children_changed(&self, element: &mut Element, children: &[ChildSnapshot]) {
        wrap_children(element, children, self.padding);
    }
}

fn wrap_children(element: &mut Element, children: &[ChildSnapshot], padding: Insets) {
    let Some(content) = children
        .iter()
        .filter(|child| child.kind == ElementKind::Node)
        .filter_map(|child| child.bounds)
        .reduce(|acc, bounds| acc.merge(&bounds))
    else {
        return;
    };

    element.set_bounds(content.add_padding(padding));
}

/// A graph, node or edge tracked by a controller.
pub struct Element {
    id: Id,
    key: ElementKey,
    element_type: String,
    parent: Option<Id>,
    children: Vec<Id>,
    attached: bool,
    revision: u64,
    data: Option<Value>,
    label: Option<String>,
    state: ElementState,
    behavior: Rc<dyn ElementBehavior>,
}

impl Element {
    /// Creates a detached element.
    ///
    /// # Arguments
    ///
    /// * `id` - Controller-wide unique identifier
    /// * `kind` - Graph, node or edge
    /// * `element_type` - Type tag used for component and layout resolution
    /// * `behavior` - Type-specific hooks
    pub fn new(
        id: Id,
        kind: ElementKind,
        element_type: impl Into<String>,
        behavior: Rc<dyn ElementBehavior>,
    ) -> Self {
        Self {
            id,
            key: ElementKey::next(),
            element_type: element_type.into(),
            parent: None,
            children: Vec::new(),
            attached: false,
            revision: 0,
            data: None,
            label: None,
            state: ElementState::for_kind(kind),
            behavior,
        }
    }

    /// Creates a detached graph element with default behavior.
    pub fn graph(id: impl Into<Id>, element_type: impl Into<String>) -> Self {
        Self::new(
            id.into(),
            ElementKind::Graph,
            element_type,
            Rc::new(DefaultBehavior::default()),
        )
    }

    /// Creates a detached node element with default behavior.
    pub fn node(id: impl Into<Id>, element_type: impl Into<String>) -> Self {
        Self::new(
            id.into(),
            ElementKind::Node,
            element_type,
            Rc::new(DefaultBehavior::default()),
        )
    }

    /// Creates a detached edge element with default behavior.
    pub fn edge(id: impl Into<Id>, element_type: impl Into<String>) -> Self {
        Self::new(
            id.into(),
            ElementKind::Edge,
            element_type,
            Rc::new(DefaultBehavior::default()),
        )
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn key(&self) -> ElementKey {
        self.key
    }

    pub fn kind(&self) -> ElementKind {
        self.state.kind()
    }

    pub fn element_type(&self) -> &str {
        &self.element_type
    }

    /// Id of the owning element.
    pub fn parent(&self) -> Option<Id> {
        self.parent
    }

    /// Ids of the owned elements, in order.
    pub fn children(&self) -> &[Id] {
        &self.children
    }

    /// Returns `true` while the element is tracked by a controller.
    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Number of visible mutations applied to this element.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn state(&self) -> &ElementState {
        &self.state
    }

    pub fn as_graph(&self) -> Option<&GraphState> {
        match &self.state {
            ElementState::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeState> {
        match &self.state {
            ElementState::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_edge(&self) -> Option<&EdgeState> {
        match &self.state {
            ElementState::Edge(edge) => Some(edge),
            _ => None,
        }
    }

    /// Bounds of a node, or the viewport of a graph. Edges have none.
    pub fn bounds(&self) -> Option<Bounds> {
        match &self.state {
            ElementState::Graph(graph) => Some(graph.bounds()),
            ElementState::Node(node) => Some(node.bounds),
            ElementState::Edge(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.as_node().is_some_and(NodeState::is_group)
    }

    pub fn set_label(&mut self, label: Option<String>) {
        if self.label != label {
            self.label = label;
            self.touch();
        }
    }

    pub fn set_data(&mut self, data: Option<Value>) {
        if self.data != data {
            self.data = data;
            self.touch();
        }
    }

    /// Moves a node so its top-left corner is at `position`.
    pub fn set_position(&mut self, position: Point) {
        if let Some(bounds) = self.bounds().filter(|_| self.kind() == ElementKind::Node) {
            self.set_bounds(bounds.with_min_point(position));
        }
    }

    /// Resizes a node, keeping its top-left corner.
    pub fn set_size(&mut self, size: Size) {
        if let Some(bounds) = self.bounds().filter(|_| self.kind() == ElementKind::Node) {
            self.set_bounds(bounds.with_size(size));
        }
    }

    /// Replaces the bounds of a node. Ignored for other kinds.
    pub fn set_bounds(&mut self, bounds: Bounds) {
        if let ElementState::Node(node) = &mut self.state {
            if node.bounds != bounds {
                node.bounds = bounds;
                self.touch();
            }
        }
    }

    /// Replaces the bend points of an edge. Ignored for other kinds.
    pub fn set_bendpoints(&mut self, bendpoints: Vec<Point>) {
        if let ElementState::Edge(edge) = &mut self.state {
            if edge.bendpoints != bendpoints {
                edge.bendpoints = bendpoints;
                self.touch();
            }
        }
    }

    /// Shifts node bounds or edge bend points by `delta`.
    pub fn translate(&mut self, delta: Point) {
        if delta.is_zero() {
            return;
        }
        match &mut self.state {
            ElementState::Node(node) => node.bounds = node.bounds.translate(delta),
            ElementState::Edge(edge) if !edge.bendpoints.is_empty() => {
                for point in &mut edge.bendpoints {
                    *point = point.add_point(delta);
                }
            }
            _ => return,
        }
        self.touch();
    }

    pub(crate) fn behavior(&self) -> Rc<dyn ElementBehavior> {
        Rc::clone(&self.behavior)
    }

    pub(crate) fn graph_state_mut(&mut self) -> Option<&mut GraphState> {
        match &mut self.state {
            ElementState::Graph(graph) => Some(graph),
            _ => None,
        }
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<Id>) {
        if self.parent != parent {
            self.parent = parent;
            self.touch();
        }
    }

    pub(crate) fn set_children(&mut self, children: Vec<Id>) {
        if self.children != children {
            self.children = children;
            self.touch();
        }
    }

    pub(crate) fn push_child(&mut self, child: Id) {
        self.children.push(child);
        self.touch();
    }

    pub(crate) fn remove_child(&mut self, child: Id) {
        let before = self.children.len();
        self.children.retain(|id| *id != child);
        if self.children.len() != before {
            self.touch();
        }
    }

    pub(crate) fn set_attached(&mut self, attached: bool) {
        self.attached = attached;
    }

    /// Clears tree links before the element is (re)inserted in a registry.
    pub(crate) fn reset_links(&mut self) {
        self.parent = None;
        self.children.clear();
    }

    /// Merges the shared model fields. Returns `true` on change.
    pub(crate) fn merge_element_model(&mut self, model: &ElementModel) -> bool {
        let before = self.revision;
        if model.data.is_some() && model.data != self.data {
            trace!(id = self.id.to_string(); "Merging data");
            self.data = model.data.clone();
            self.touch();
        }
        if model.label.is_some() && model.label != self.label {
            trace!(id = self.id.to_string(), label = model.label.as_deref(); "Merging label");
            self.label = model.label.clone();
            self.touch();
        }
        self.revision != before
    }

    /// Merges node fields; absent fields keep their current value.
    pub(crate) fn merge_node_model(&mut self, model: &NodeModel) {
        let ElementState::Node(node) = &mut self.state else {
            return;
        };

        let current = node.bounds;
        let position = Point::new(
            model.x.unwrap_or(current.min_x()),
            model.y.unwrap_or(current.min_y()),
        );
        let size = Size::new(
            model.width.unwrap_or(current.width()),
            model.height.unwrap_or(current.height()),
        );
        let moved = position != current.min_point();
        let resized = model.width.is_some_and(|width| width != current.width())
            || model.height.is_some_and(|height| height != current.height());

        let mut changed = false;
        if moved || resized {
            let bounds = Bounds::new_from_top_left(position, size);
            trace!(id = self.id.to_string(), bounds:?; "Merging node bounds");
            node.bounds = bounds;
            changed = true;
        }
        if let Some(group) = model.group.filter(|group| *group != node.group) {
            node.group = group;
            changed = true;
        }
        if changed {
            self.touch();
        }
    }

    /// Merges edge fields; absent fields keep their current value.
    pub(crate) fn merge_edge_model(&mut self, model: &EdgeModel) {
        let ElementState::Edge(edge) = &mut self.state else {
            return;
        };

        let mut changed = false;
        if model.source.is_some() && model.source != edge.source {
            edge.source = model.source;
            changed = true;
        }
        if model.target.is_some() && model.target != edge.target {
            edge.target = model.target;
            changed = true;
        }
        if let Some(bendpoints) = model.bendpoints.as_ref().filter(|b| **b != edge.bendpoints) {
            edge.bendpoints = bendpoints.clone();
            changed = true;
        }
        if changed {
            trace!(id = self.id.to_string(); "Merged edge fields");
            self.touch();
        }
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("type", &self.element_type)
            .field("parent", &self.parent)
            .field("children", &self.children)
            .field("attached", &self.attached)
            .field("revision", &self.revision)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;
    use serde_json::json;

    use super::*;

    fn snapshot(id: &str, bounds: Bounds) -> ChildSnapshot {
        ChildSnapshot {
            id: Id::new(id),
            kind: ElementKind::Node,
            bounds: Some(bounds),
        }
    }

    #[test]
    fn test_keys_are_unique() {
        let a = Element::node("same", "node");
        let b = Element::node("same", "node");

        assert_eq!(a.id(), b.id());
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn test_new_element_is_detached() {
        let element = Element::edge("e", "edge");

        assert_eq!(element.kind(), ElementKind::Edge);
        assert!(!element.is_attached());
        assert_eq!(element.parent(), None);
        assert!(element.children().is_empty());
        assert_eq!(element.revision(), 0);
        assert_eq!(element.bounds(), None);
    }

    #[test]
    fn test_merge_node_model_partial() {
        let mut element = Element::node("n", "node");
        element.merge_node_model(
            &NodeModel::new("n", "node")
                .with_position(10.0, 20.0)
                .with_size(30.0, 40.0),
        );
        let revision = element.revision();

        let mut partial = NodeModel::new("n", "node");
        partial.x = Some(15.0);
        element.merge_node_model(&partial);

        let bounds = element.bounds().unwrap();
        assert_approx_eq!(f32, bounds.min_x(), 15.0);
        assert_approx_eq!(f32, bounds.min_y(), 20.0);
        assert_approx_eq!(f32, bounds.width(), 30.0);
        assert_eq!(element.revision(), revision + 1);
    }

    #[test]
    fn test_merge_unchanged_keeps_revision() {
        let mut element = Element::node("n", "node");
        let model = NodeModel::new("n", "node")
            .with_position(1.0, 2.0)
            .with_label("n")
            .with_data(json!({ "k": 1 }));

        element.merge_node_model(&model);
        assert!(element.merge_element_model(&model.element));
        let revision = element.revision();

        element.merge_node_model(&model);
        assert!(!element.merge_element_model(&model.element));
        assert_eq!(element.revision(), revision);
    }

    #[test]
    fn test_merge_edge_model() {
        let mut element = Element::edge("e", "edge");
        element.merge_edge_model(
            &EdgeModel::new("e", "edge")
                .with_endpoints("a", "b")
                .with_bendpoints(vec![Point::new(1.0, 1.0)]),
        );

        // Absent endpoints leave the current ones in place.
        element.merge_edge_model(&EdgeModel::new("e", "edge"));

        let edge = element.as_edge().unwrap();
        assert_eq!(edge.source(), Some(Id::new("a")));
        assert_eq!(edge.target(), Some(Id::new("b")));
        assert_eq!(edge.bendpoints(), &[Point::new(1.0, 1.0)]);
    }

    #[test]
    fn test_group_behavior_wraps_children() {
        let mut group = Element::node("grp", "group");
        let behavior = GroupBehavior::new(10.0);
        let children = [
            snapshot(
                "a",
                Bounds::new_from_top_left(Point::new(0.0, 0.0), Size::new(10.0, 10.0)),
            ),
            snapshot(
                "b",
                Bounds::new_from_top_left(Point::new(50.0, 20.0), Size::new(10.0, 10.0)),
            ),
        ];

        behavior.model_applied(&mut group, &children);

        assert!(group.is_group());
        let bounds = group.bounds().unwrap();
        assert_approx_eq!(f32, bounds.min_x(), -10.0);
        assert_approx_eq!(f32, bounds.min_y(), -10.0);
        assert_approx_eq!(f32, bounds.max_x(), 70.0);
        assert_approx_eq!(f32, bounds.max_y(), 40.0);
    }

    #[test]
    fn test_group_without_children_keeps_bounds() {
        let mut group = Element::node("grp", "group");
        group.set_bounds(Bounds::new_from_top_left(
            Point::new(5.0, 5.0),
            Size::new(20.0, 20.0),
        ));

        GroupBehavior::new(10.0).model_applied(&mut group, &[]);

        assert_approx_eq!(f32, group.bounds().unwrap().min_x(), 5.0);
    }

    #[test]
    fn test_default_behavior_ignores_plain_nodes() {
        let mut node = Element::node("n", "node");
        let children = [snapshot(
            "a",
            Bounds::new_from_top_left(Point::new(100.0, 100.0), Size::new(10.0, 10.0)),
        )];

        DefaultBehavior::default().model_applied(&mut node, &children);

        assert_eq!(node.bounds(), Some(Bounds::default()));
    }

    #[test]
    fn test_translate_moves_nodes_and_bendpoints() {
        let mut node = Element::node("n", "node");
        node.set_position(Point::new(1.0, 1.0));
        node.translate(Point::new(2.0, 3.0));
        assert_eq!(node.as_node().unwrap().position(), Point::new(3.0, 4.0));

        let mut edge = Element::edge("e", "edge");
        edge.set_bendpoints(vec![Point::new(0.0, 0.0)]);
        edge.translate(Point::new(2.0, 3.0));
        assert_eq!(edge.as_edge().unwrap().bendpoints(), &[Point::new(2.0, 3.0)]);
    }

    #[test]
    fn test_setters_ignore_wrong_kind() {
        let mut edge = Element::edge("e", "edge");
        edge.set_position(Point::new(5.0, 5.0));
        edge.set_bounds(Bounds::default());

        assert_eq!(edge.revision(), 0);
        assert_eq!(edge.bounds(), None);
    }
}
