//! Layout plugin contract.
//!
//! A [`Layout`] computes node positions for one graph. The controller hands
//! it a [`LayoutGraph`]: a detached working copy of the graph's direct node
//! children, the edges between them and the viewport. After `layout()`
//! returns, the controller writes the new positions back, moving the
//! descendants of group nodes along with them.
//!
//! Built-in engines live in [`engines`] and are selected by type tag.

pub mod engines;

use indexmap::IndexMap;
use thiserror::Error;

use trellis_core::{
    geometry::{Bounds, Point, Size},
    identifier::Id,
};

/// Failure of a layout engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("node `{0}` is not part of the layout graph")]
    UnknownNode(Id),

    #[error("{engine} layout failed: {reason}")]
    Engine { engine: String, reason: String },
}

impl LayoutError {
    pub fn engine(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Engine {
            engine: engine.into(),
            reason: reason.into(),
        }
    }
}

/// A pluggable position algorithm bound to one graph.
pub trait Layout {
    /// Recomputes node positions in `graph`.
    fn layout(&mut self, graph: &mut LayoutGraph) -> Result<(), LayoutError>;

    /// Releases resources before the layout is unbound.
    fn destroy(&mut self) {}
}

/// A node as seen by a layout engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    id: Id,
    bounds: Bounds,
    group: bool,
}

impl LayoutNode {
    pub fn new(id: Id, bounds: Bounds, group: bool) -> Self {
        Self { id, bounds, group }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn size(&self) -> Size {
        self.bounds.to_size()
    }

    /// Top-left corner.
    pub fn position(&self) -> Point {
        self.bounds.min_point()
    }

    pub fn is_group(&self) -> bool {
        self.group
    }
}

/// A connection between two layout nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEdge {
    id: Id,
    source: Id,
    target: Id,
}

impl LayoutEdge {
    pub fn new(id: Id, source: Id, target: Id) -> Self {
        Self { id, source, target }
    }

    pub fn id(&self) -> Id {
        self.id
    }

    pub fn source(&self) -> Id {
        self.source
    }

    pub fn target(&self) -> Id {
        self.target
    }
}

/// Working copy of a graph handed to layout engines.
#[derive(Debug, Clone, Default)]
pub struct LayoutGraph {
    nodes: IndexMap<Id, LayoutNode>,
    edges: Vec<LayoutEdge>,
    viewport: Bounds,
}

impl LayoutGraph {
    pub fn new(viewport: Bounds) -> Self {
        Self {
            viewport,
            ..Self::default()
        }
    }

    pub fn add_node(&mut self, node: LayoutNode) {
        self.nodes.insert(node.id, node);
    }

    /// Adds an edge. Edges with an endpoint outside the graph are ignored.
    pub fn add_edge(&mut self, edge: LayoutEdge) -> bool {
        if self.nodes.contains_key(&edge.source) && self.nodes.contains_key(&edge.target) {
            self.edges.push(edge);
            true
        } else {
            false
        }
    }

    /// Nodes in graph child order.
    pub fn nodes(&self) -> impl ExactSizeIterator<Item = &LayoutNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: Id) -> Option<&LayoutNode> {
        self.nodes.get(&id)
    }

    /// Position of `id` in node order.
    pub fn node_index(&self, id: Id) -> Option<usize> {
        self.nodes.get_index_of(&id)
    }

    pub fn edges(&self) -> &[LayoutEdge] {
        &self.edges
    }

    pub fn viewport(&self) -> Bounds {
        self.viewport
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Largest width and height over all nodes.
    pub fn max_node_size(&self) -> Size {
        self.nodes
            .values()
            .fold(Size::default(), |acc, node| acc.max(node.size()))
    }

    /// Moves node `id` so its top-left corner is at `position`.
    pub fn set_position(&mut self, id: Id, position: Point) -> Result<(), LayoutError> {
        let node = self.nodes.get_mut(&id).ok_or(LayoutError::UnknownNode(id))?;
        node.bounds = node.bounds.with_min_point(position);
        Ok(())
    }

    /// Moves node `id` so its center is at `center`.
    pub fn set_center(&mut self, id: Id, center: Point) -> Result<(), LayoutError> {
        let node = self.nodes.get_mut(&id).ok_or(LayoutError::UnknownNode(id))?;
        node.bounds = Bounds::new_from_center(center, node.bounds.to_size());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    fn graph() -> LayoutGraph {
        let mut graph = LayoutGraph::new(Bounds::default());
        graph.add_node(LayoutNode::new(
            Id::new("a"),
            Bounds::new_from_top_left(Point::default(), Size::new(10.0, 20.0)),
            false,
        ));
        graph.add_node(LayoutNode::new(
            Id::new("b"),
            Bounds::new_from_top_left(Point::default(), Size::new(30.0, 5.0)),
            false,
        ));
        graph
    }

    #[test]
    fn test_add_edge_requires_both_endpoints() {
        let mut graph = graph();

        assert!(graph.add_edge(LayoutEdge::new(Id::new("e1"), Id::new("a"), Id::new("b"))));
        assert!(!graph.add_edge(LayoutEdge::new(Id::new("e2"), Id::new("a"), Id::new("zz"))));
        assert_eq!(graph.edges().len(), 1);
    }

    #[test]
    fn test_set_position_keeps_size() {
        let mut graph = graph();
        graph.set_position(Id::new("a"), Point::new(5.0, 6.0)).unwrap();

        let node = graph.node(Id::new("a")).unwrap();
        assert_eq!(node.position(), Point::new(5.0, 6.0));
        assert_approx_eq!(f32, node.size().height(), 20.0);
    }

    #[test]
    fn test_set_center() {
        let mut graph = graph();
        graph.set_center(Id::new("b"), Point::new(100.0, 100.0)).unwrap();

        let node = graph.node(Id::new("b")).unwrap();
        assert_approx_eq!(f32, node.position().x(), 85.0);
        assert_approx_eq!(f32, node.position().y(), 97.5);
    }

    #[test]
    fn test_unknown_node() {
        let mut graph = graph();
        let err = graph.set_position(Id::new("zz"), Point::default()).unwrap_err();
        assert_eq!(err, LayoutError::UnknownNode(Id::new("zz")));
    }

    #[test]
    fn test_max_node_size() {
        let size = graph().max_node_size();
        assert_approx_eq!(f32, size.width(), 30.0);
        assert_approx_eq!(f32, size.height(), 20.0);
        assert_eq!(graph().node_index(Id::new("b")), Some(1));
    }
}
