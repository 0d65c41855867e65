//! Sugiyama layout engine
//!
//! Layered drawing of directed graphs with crossing reduction, backed by
//! the `rust-sugiyama` crate. Each connected component is laid out on its
//! own and placed to the right of the previous one. Nodes without edges
//! follow in a single row.

use std::{
    collections::{HashMap, HashSet},
    panic,
};

use log::{debug, warn};
use rust_sugiyama::configure::Config;

use trellis_core::{
    geometry::{Point, Size},
    identifier::Id,
};

use crate::layout::{Layout, LayoutError, LayoutGraph};

/// Horizontal distance `rust-sugiyama` keeps between neighbouring vertices.
const VERTEX_SPACING: f64 = 3.0;

/// The Sugiyama layout engine
pub struct Engine {
    spacing: f32,
}

impl Engine {
    /// Create a new Sugiyama layout engine
    pub fn new() -> Self {
        Self { spacing: 50.0 }
    }

    /// Set the spacing between layers and between nodes of a layer
    pub fn set_spacing(&mut self, spacing: f32) -> &mut Self {
        self.spacing = spacing;
        self
    }

    /// Runs `rust-sugiyama`, turning a panic inside the crate into an error.
    fn run(edges: Vec<(u32, u32)>) -> Result<Vec<Vec<(usize, (f64, f64))>>, LayoutError> {
        let layouts = panic::catch_unwind(move || {
            let config = Config {
                minimum_length: 1,
                vertex_spacing: VERTEX_SPACING,
                ..Default::default()
            };
            rust_sugiyama::from_edges(&edges, &config)
        })
        .map_err(|err| {
            let reason = err
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| err.downcast_ref::<&str>().map(|msg| msg.to_string()))
                .unwrap_or_else(|| "unknown panic".to_string());
            LayoutError::engine("sugiyama", reason)
        })?;

        if layouts.is_empty() {
            return Err(LayoutError::engine(
                "sugiyama",
                "no layout produced for a non-empty edge set",
            ));
        }

        Ok(layouts
            .into_iter()
            .map(|(coords, _width, _height)| coords)
            .collect())
    }

    /// Maps raw y coordinates to layer ranks, oriented so that most edges
    /// point downwards.
    fn ranks(coords: &[(usize, (f64, f64))], edges: &[(u32, u32)]) -> HashMap<usize, usize> {
        let mut levels: Vec<f64> = coords.iter().map(|(_, (_, y))| *y).collect();
        levels.sort_by(f64::total_cmp);
        levels.dedup_by(|a, b| (*a - *b).abs() < 1e-6);

        let mut ranks: HashMap<usize, usize> = coords
            .iter()
            .map(|&(id, (_, y))| {
                let rank = levels
                    .iter()
                    .position(|level| (level - y).abs() < 1e-6)
                    .unwrap_or_default();
                (id, rank)
            })
            .collect();

        let (forward, backward) =
            edges
                .iter()
                .fold((0, 0), |(forward, backward), &(source, target)| {
                    match (ranks.get(&(source as usize)), ranks.get(&(target as usize))) {
                        (Some(s), Some(t)) if s < t => (forward + 1, backward),
                        (Some(s), Some(t)) if s > t => (forward, backward + 1),
                        _ => (forward, backward),
                    }
                });
        if backward > forward {
            let deepest = levels.len().saturating_sub(1);
            for rank in ranks.values_mut() {
                *rank = deepest - *rank;
            }
        }

        ranks
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout for Engine {
    fn layout(&mut self, graph: &mut LayoutGraph) -> Result<(), LayoutError> {
        if graph.is_empty() {
            return Ok(());
        }

        let ids: Vec<Id> = graph.nodes().map(|node| node.id()).collect();
        let index: HashMap<Id, u32> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i as u32))
            .collect();

        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for edge in graph.edges() {
            if let (Some(&source), Some(&target)) =
                (index.get(&edge.source()), index.get(&edge.target()))
            {
                // Self-loops do not influence layering.
                if source != target && seen.insert((source, target)) {
                    edges.push((source, target));
                }
            }
        }

        let largest = graph.max_node_size();
        let cell = Size::new(
            largest.width() + self.spacing,
            largest.height() + self.spacing,
        );

        let mut placed: HashSet<usize> = HashSet::new();
        let mut offset_x = 0.0;

        if !edges.is_empty() {
            debug!(
                nodes = ids.len(),
                edges = edges.len();
                "Applying Sugiyama algorithm"
            );

            for coords in Self::run(edges.clone())? {
                let ranks = Self::ranks(&coords, &edges);
                let min_x = coords
                    .iter()
                    .map(|(_, (x, _))| *x)
                    .fold(f64::INFINITY, f64::min);

                let mut max_column: f32 = 0.0;
                for &(vertex, (x, _)) in &coords {
                    let Some(&id) = ids.get(vertex) else {
                        warn!(vertex; "rust-sugiyama returned an unknown vertex");
                        continue;
                    };
                    let column = ((x - min_x) / VERTEX_SPACING) as f32;
                    let rank = ranks.get(&vertex).copied().unwrap_or_default();
                    max_column = max_column.max(column);

                    graph.set_position(
                        id,
                        Point::new(offset_x + column * cell.width(), rank as f32 * cell.height()),
                    )?;
                    placed.insert(vertex);
                }

                offset_x += (max_column + 1.0) * cell.width();
            }
        }

        // Isolated nodes follow the components in one row.
        let isolated: Vec<Id> = ids
            .iter()
            .enumerate()
            .filter(|(i, _)| !placed.contains(i))
            .map(|(_, id)| *id)
            .collect();
        for (i, id) in isolated.iter().enumerate() {
            graph.set_position(*id, Point::new(offset_x + i as f32 * cell.width(), 0.0))?;
        }

        debug!(
            positioned = placed.len(),
            isolated = isolated.len();
            "Applied Sugiyama layout"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use trellis_core::geometry::Bounds;

    use super::*;
    use crate::layout::{LayoutEdge, LayoutNode};

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> LayoutGraph {
        let mut graph = LayoutGraph::new(Bounds::default());
        for id in nodes {
            graph.add_node(LayoutNode::new(
                Id::new(id),
                Bounds::new_from_top_left(Point::new(-1.0, -1.0), Size::new(20.0, 10.0)),
                false,
            ));
        }
        for (source, target) in edges {
            graph.add_edge(LayoutEdge::new(
                Id::new(&format!("{source}-{target}")),
                Id::new(source),
                Id::new(target),
            ));
        }
        graph
    }

    fn y_of(graph: &LayoutGraph, id: &str) -> f32 {
        graph.node(Id::new(id)).unwrap().position().y()
    }

    #[test]
    fn test_chain_descends_layers() {
        let mut graph = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);

        Engine::new().layout(&mut graph).unwrap();

        assert!(y_of(&graph, "a") < y_of(&graph, "b"));
        assert!(y_of(&graph, "b") < y_of(&graph, "c"));
    }

    #[test]
    fn test_isolated_nodes_are_placed() {
        let mut graph = graph(&["a", "b", "solo1", "solo2"], &[("a", "b")]);

        Engine::new().layout(&mut graph).unwrap();

        let solo1 = graph.node(Id::new("solo1")).unwrap().position();
        let solo2 = graph.node(Id::new("solo2")).unwrap().position();
        assert!(solo1.x() >= 0.0);
        assert!(solo2.x() > solo1.x());
        assert_eq!(solo1.y(), solo2.y());
    }

    #[test]
    fn test_only_isolated_nodes() {
        let mut graph = graph(&["a", "b"], &[]);

        Engine::new().layout(&mut graph).unwrap();

        assert_eq!(graph.node(Id::new("a")).unwrap().position(), Point::new(0.0, 0.0));
        assert_eq!(graph.node(Id::new("b")).unwrap().position(), Point::new(70.0, 0.0));
    }

    #[test]
    fn test_ranks_follow_edge_direction() {
        // Raw coordinates with y decreasing along the edge.
        let coords = vec![(0, (0.0, 0.0)), (1, (0.0, -3.0)), (2, (0.0, -6.0))];
        let ranks = Engine::ranks(&coords, &[(0, 1), (1, 2)]);

        assert_eq!(ranks[&0], 0);
        assert_eq!(ranks[&1], 1);
        assert_eq!(ranks[&2], 2);
    }
}
