//! Layered layout engine
//!
//! A simple, deterministic layout: nodes are assigned to layers by a
//! breadth-first walk starting at the root nodes (nodes without incoming
//! edges). Layers run left to right and nodes are stacked top to bottom
//! within a layer.

use std::collections::{HashMap, HashSet, VecDeque};

use log::debug;
use petgraph::{
    Direction,
    graph::{DiGraph, NodeIndex},
};

use trellis_core::{geometry::Point, identifier::Id};

use crate::layout::{Layout, LayoutError, LayoutGraph};

/// Layered layout engine
pub struct Engine {
    spacing: f32,
}

impl Engine {
    /// Create a new layered layout engine
    pub fn new() -> Self {
        Self { spacing: 50.0 }
    }

    /// Set the spacing between layers and between nodes of a layer
    pub fn set_spacing(&mut self, spacing: f32) -> &mut Self {
        self.spacing = spacing;
        self
    }

    fn to_graph(graph: &LayoutGraph) -> DiGraph<Id, ()> {
        let mut layer_graph = DiGraph::new();
        let mut node_map = HashMap::new();

        for node in graph.nodes() {
            let idx = layer_graph.add_node(node.id());
            node_map.insert(node.id(), idx);
        }

        for edge in graph.edges() {
            if let (Some(&src_idx), Some(&tgt_idx)) =
                (node_map.get(&edge.source()), node_map.get(&edge.target()))
            {
                layer_graph.add_edge(src_idx, tgt_idx, ());
            }
        }

        layer_graph
    }

    /// Assigns every node to a layer.
    ///
    /// Nodes unreachable from any root (cycles) start a new walk at layer 0.
    fn assign_layers(layer_graph: &DiGraph<Id, ()>) -> Vec<Vec<Id>> {
        let mut layers: Vec<Vec<Id>> = Vec::new();
        let mut visited = HashSet::new();

        let roots: Vec<NodeIndex> = layer_graph
            .node_indices()
            .filter(|&idx| {
                layer_graph
                    .neighbors_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        let rest: Vec<NodeIndex> = layer_graph.node_indices().collect();

        let mut queue = VecDeque::new();
        for start in roots.into_iter().chain(rest) {
            if visited.contains(&start) {
                continue;
            }
            queue.push_back((start, 0));

            while let Some((idx, layer)) = queue.pop_front() {
                if !visited.insert(idx) {
                    continue;
                }
                while layers.len() <= layer {
                    layers.push(Vec::new());
                }
                layers[layer].push(layer_graph[idx]);

                for child in layer_graph.neighbors_directed(idx, Direction::Outgoing) {
                    if !visited.contains(&child) {
                        queue.push_back((child, layer + 1));
                    }
                }
            }
        }

        layers
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

        let layers = Self::assign_layers(&Self::to_graph(graph));
        let layer_width = graph.max_node_size().width() + self.spacing;

        for (layer_idx, layer) in layers.iter().enumerate() {
            let x = layer_idx as f32 * layer_width;
            let mut y = 0.0;
            for &id in layer {
                let height = graph.node(id).map_or(0.0, |node| node.size().height());
                graph.set_position(id, Point::new(x, y))?;
                y += height + self.spacing;
            }
        }

        debug!(layers = layers.len(); "Applied layered layout");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use trellis_core::geometry::{Bounds, Size};

    use super::*;
    use crate::layout::{LayoutEdge, LayoutNode};

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> LayoutGraph {
        let mut graph = LayoutGraph::new(Bounds::default());
        for id in nodes {
            graph.add_node(LayoutNode::new(
                Id::new(id),
                Bounds::new_from_top_left(Point::default(), Size::new(20.0, 10.0)),
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

    fn x_of(graph: &LayoutGraph, id: &str) -> f32 {
        graph.node(Id::new(id)).unwrap().position().x()
    }

    #[test]
    fn test_chain_is_layered_left_to_right() {
        let mut graph = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
        let mut engine = Engine::new();
        engine.set_spacing(10.0);

        engine.layout(&mut graph).unwrap();

        assert_approx_eq!(f32, x_of(&graph, "a"), 0.0);
        assert_approx_eq!(f32, x_of(&graph, "b"), 30.0);
        assert_approx_eq!(f32, x_of(&graph, "c"), 60.0);
    }

    #[test]
    fn test_default_uses_standard_spacing() {
        let mut graph = graph(&["a", "b"], &[("a", "b")]);

        Engine::default().layout(&mut graph).unwrap();

        assert_approx_eq!(f32, x_of(&graph, "b"), 70.0);
    }

    #[test]
    fn test_siblings_share_a_layer() {
        let mut graph = graph(&["root", "l", "r"], &[("root", "l"), ("root", "r")]);
        let mut engine = Engine::new();
        engine.set_spacing(10.0);

        engine.layout(&mut graph).unwrap();

        assert_approx_eq!(f32, x_of(&graph, "l"), x_of(&graph, "r"));
        let l = graph.node(Id::new("l")).unwrap().position().y();
        let r = graph.node(Id::new("r")).unwrap().position().y();
        assert_approx_eq!(f32, (r - l).abs(), 20.0);
    }

    #[test]
    fn test_cycle_without_root_is_placed() {
        let mut graph = graph(&["a", "b", "lonely"], &[("a", "b"), ("b", "a")]);

        Engine::new().layout(&mut graph).unwrap();

        let layers = Engine::assign_layers(&Engine::to_graph(&graph));
        let placed: usize = layers.iter().map(Vec::len).sum();
        assert_eq!(placed, 3);
    }
}
