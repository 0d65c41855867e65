//! Force-directed layout engine
//!
//! Positions nodes with a physics simulation: every pair of nodes repels,
//! every edge acts as a spring, and velocities are damped each step. The
//! initial positions are a grid with seeded jitter, so the same graph and
//! seed always produce the same drawing.

use indexmap::IndexMap;
use log::debug;
use rand::{Rng, SeedableRng, rngs::StdRng};

use trellis_core::{
    geometry::{Point, Size},
    identifier::Id,
};

use crate::layout::{Layout, LayoutError, LayoutGraph};

/// Force layout engine
///
/// Attractive forces pull connected nodes together, repulsive forces keep
/// all nodes apart, scaled by node size so large nodes claim more room.
pub struct Engine {
    // Simulation parameters
    iterations: usize,
    spring_constant: f32,
    repulsion_constant: f32,
    damping_factor: f32,
    // Used for maintaining distance between nodes
    min_distance: f32,
    seed: u64,
}

impl Engine {
    /// Create a new force layout engine
    pub fn new() -> Self {
        Self {
            iterations: 300,
            spring_constant: 0.1,
            repulsion_constant: 1000.0,
            damping_factor: 0.85,
            min_distance: 50.0,
            seed: 7,
        }
    }

    /// Set the number of iterations for the force simulation
    pub fn set_iterations(&mut self, iterations: usize) -> &mut Self {
        self.iterations = iterations;
        self
    }

    /// Set the spring constant for edge forces
    pub fn set_spring_constant(&mut self, constant: f32) -> &mut Self {
        self.spring_constant = constant;
        self
    }

    /// Set the repulsion constant for node forces
    pub fn set_repulsion_constant(&mut self, constant: f32) -> &mut Self {
        self.repulsion_constant = constant;
        self
    }

    /// Set the damping factor for the simulation
    pub fn set_damping_factor(&mut self, factor: f32) -> &mut Self {
        self.damping_factor = factor;
        self
    }

    /// Set the minimum distance between nodes
    pub fn set_min_distance(&mut self, distance: f32) -> &mut Self {
        self.min_distance = distance;
        self
    }

    /// Set the seed of the initial jitter
    pub fn set_seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Initialize positions on a grid with some randomness
    fn initialize_positions(&self, graph: &LayoutGraph) -> IndexMap<Id, Point> {
        let mut rng = StdRng::seed_from_u64(self.seed);

        let node_count = graph.nodes().len();
        let grid_size = (node_count as f32).sqrt().ceil().max(1.0) as usize;
        let cell_size = self.min_distance * 1.5;

        graph
            .nodes()
            .enumerate()
            .map(|(i, node)| {
                let row = i / grid_size;
                let col = i % grid_size;

                let base = Point::new(col as f32 * cell_size, row as f32 * cell_size);

                // Avoid perfect grid alignment
                let jitter = Point::new(
                    rng.random_range(-20.0f32..20.0),
                    rng.random_range(-20.0f32..20.0),
                );

                (node.id(), base.add_point(jitter))
            })
            .collect()
    }

    /// Run force-directed layout algorithm, returning node centers
    fn run_force_simulation(&self, graph: &LayoutGraph) -> IndexMap<Id, Point> {
        let mut positions = self.initialize_positions(graph);
        let sizes: IndexMap<Id, Size> = graph.nodes().map(|node| (node.id(), node.size())).collect();
        let mut velocities: IndexMap<Id, Point> =
            positions.keys().map(|&id| (id, Point::default())).collect();
        let nodes: Vec<Id> = positions.keys().copied().collect();

        for _ in 0..self.iterations {
            let mut forces: IndexMap<Id, Point> =
                nodes.iter().map(|&id| (id, Point::default())).collect();

            // Repulsive forces between all nodes
            for &node_i in &nodes {
                for &node_j in &nodes {
                    if node_i == node_j {
                        continue;
                    }

                    let trans = positions[&node_i].sub_point(positions[&node_j]);
                    let size_i = sizes[&node_i];
                    let size_j = sizes[&node_j];

                    // Minimum distance based on node sizes plus padding
                    let min_dist =
                        (size_i.width() + size_j.width() + size_i.height() + size_j.height()) / 4.0
                            + self.min_distance;

                    // Avoid division by zero
                    let distance = trans.hypot().max(1.0);

                    // Stronger repulsion when nodes are too close
                    let force_factor = if distance < min_dist {
                        self.repulsion_constant * (min_dist / distance).powf(2.0)
                    } else {
                        self.repulsion_constant / distance
                    };

                    let force = trans.scale(force_factor / distance);
                    forces[&node_i] = forces[&node_i].add_point(force);
                }
            }

            // Spring forces between connected nodes
            for edge in graph.edges() {
                let (source, target) = (edge.source(), edge.target());
                if source == target {
                    continue;
                }
                let (Some(&pos_source), Some(&pos_target)) =
                    (positions.get(&source), positions.get(&target))
                else {
                    continue;
                };

                // Spring force, proportional to the distance
                let force = pos_source.sub_point(pos_target).scale(self.spring_constant);

                forces[&source] = forces[&source].sub_point(force);
                forces[&target] = forces[&target].add_point(force);
            }

            // Update velocities and positions
            for &node in &nodes {
                let velocity = velocities[&node]
                    .add_point(forces[&node])
                    .scale(self.damping_factor);
                velocities[&node] = velocity;
                positions[&node] = positions[&node].add_point(velocity);
            }
        }

        self.center_layout(&mut positions);
        positions
    }

    /// Center the layout around the origin
    fn center_layout(&self, positions: &mut IndexMap<Id, Point>) {
        if positions.is_empty() {
            return;
        }

        let (min, max) = positions.values().fold(
            (
                Point::new(f32::MAX, f32::MAX),
                Point::new(f32::MIN, f32::MIN),
            ),
            |(min, max), pos| {
                (
                    Point::new(min.x().min(pos.x()), min.y().min(pos.y())),
                    Point::new(max.x().max(pos.x()), max.y().max(pos.y())),
                )
            },
        );

        let center = min.midpoint(max);
        for pos in positions.values_mut() {
            *pos = pos.sub_point(center);
        }
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

        let centers = self.run_force_simulation(graph);
        if let Some((id, _)) = centers
            .iter()
            .find(|(_, center)| !(center.x().is_finite() && center.y().is_finite()))
        {
            return Err(LayoutError::engine(
                "force",
                format!("simulation diverged at node `{id}`"),
            ));
        }

        for (id, center) in centers {
            graph.set_center(id, center)?;
        }

        debug!(
            nodes = graph.nodes().len(),
            iterations = self.iterations;
            "Applied force layout"
        );
        Ok(())
    }
}
