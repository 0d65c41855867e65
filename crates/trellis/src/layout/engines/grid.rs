//! Grid layout engine
//!
//! Places nodes row by row in a square-ish grid. Every cell is as large as
//! the largest node plus the spacing, and each node is centered in its cell.

use log::debug;

use trellis_core::{
    geometry::{Point, Size},
    identifier::Id,
};

use crate::layout::{Layout, LayoutError, LayoutGraph};

/// Grid layout engine
pub struct Engine {
    spacing: f32,
}

impl Engine {
    /// Create a new grid layout engine
    pub fn new() -> Self {
        Self { spacing: 50.0 }
    }

    /// Set the gap between neighbouring cells
    pub fn set_spacing(&mut self, spacing: f32) -> &mut Self {
        self.spacing = spacing;
        self
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout for Engine {
    fn layout(&mut self, graph: &mut LayoutGraph) -> Result<(), LayoutError> {
        let node_count = graph.nodes().len();
        if node_count == 0 {
            return Ok(());
        }

        let columns = (node_count as f32).sqrt().ceil() as usize;
        let largest = graph.max_node_size();
        let cell = Size::new(
            largest.width() + self.spacing,
            largest.height() + self.spacing,
        );

        let nodes: Vec<(Id, Size)> = graph.nodes().map(|node| (node.id(), node.size())).collect();
        for (i, (id, size)) in nodes.into_iter().enumerate() {
            let row = i / columns;
            let col = i % columns;
            let position = Point::new(
                col as f32 * cell.width() + (largest.width() - size.width()) / 2.0,
                row as f32 * cell.height() + (largest.height() - size.height()) / 2.0,
            );
            graph.set_position(id, position)?;
        }

        debug!(nodes = node_count, columns; "Applied grid layout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use trellis_core::geometry::Bounds;

    use super::*;
    use crate::layout::LayoutNode;

    fn graph_with(sizes: &[(f32, f32)]) -> LayoutGraph {
        let mut graph = LayoutGraph::new(Bounds::default());
        for (i, (width, height)) in sizes.iter().enumerate() {
            graph.add_node(LayoutNode::new(
                Id::new(&format!("n{i}")),
                Bounds::new_from_top_left(Point::new(500.0, 500.0), Size::new(*width, *height)),
                false,
            ));
        }
        graph
    }

    #[test]
    fn test_empty_graph() {
        let mut graph = LayoutGraph::default();
        assert!(Engine::new().layout(&mut graph).is_ok());
    }

    #[test]
    fn test_square_grid() {
        let mut graph = graph_with(&[(10.0, 10.0); 4]);
        let mut engine = Engine::new();
        engine.set_spacing(5.0);

        engine.layout(&mut graph).unwrap();

        let positions: Vec<Point> = graph.nodes().map(|node| node.position()).collect();
        assert_eq!(
            positions,
            vec![
                Point::new(0.0, 0.0),
                Point::new(15.0, 0.0),
                Point::new(0.0, 15.0),
                Point::new(15.0, 15.0),
            ]
        );
    }

    #[test]
    fn test_nodes_centered_in_cells() {
        let mut graph = graph_with(&[(40.0, 20.0), (10.0, 10.0)]);
        let mut engine = Engine::new();
        engine.set_spacing(0.0);

        engine.layout(&mut graph).unwrap();

        let small = graph.node(Id::new("n1")).unwrap();
        assert_approx_eq!(f32, small.bounds().center().x(), 60.0);
        assert_approx_eq!(f32, small.bounds().center().y(), 10.0);
    }
}
