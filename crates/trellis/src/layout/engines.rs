//! Built-in layout engines.
//!
//! Each engine handles one or more layout type tags:
//!
//! - `grid` - [`grid::Engine`], row-major grid
//! - `layered` - [`layered::Engine`], breadth-first layering from root nodes
//! - `dagre`, `sugiyama` - [`sugiyama::Engine`], layered drawing with crossing reduction
//! - `force` - [`force::Engine`], spring and repulsion simulation

pub mod force;
pub mod grid;
pub mod layered;
pub mod sugiyama;

use log::debug;

use crate::{
    config::LayoutConfig,
    factory::{FactoryChain, LayoutFactory},
    layout::{Layout, LayoutGraph},
};

pub const GRID: &str = "grid";
pub const LAYERED: &str = "layered";
pub const DAGRE: &str = "dagre";
pub const SUGIYAMA: &str = "sugiyama";
pub const FORCE: &str = "force";

/// Type tags handled by the built-in engines.
pub const BUILTIN_TYPES: [&str; 5] = [GRID, LAYERED, DAGRE, SUGIYAMA, FORCE];

/// Registers one factory per built-in engine, configured from `config`.
pub(crate) fn register_defaults(chain: &mut FactoryChain<LayoutFactory>, config: &LayoutConfig) {
    let spacing = config.spacing();

    chain.register(engine_factory(&[GRID], move || {
        let mut engine = grid::Engine::new();
        engine.set_spacing(spacing);
        engine
    }));

    chain.register(engine_factory(&[LAYERED], move || {
        let mut engine = layered::Engine::new();
        engine.set_spacing(spacing);
        engine
    }));

    chain.register(engine_factory(&[DAGRE, SUGIYAMA], move || {
        let mut engine = sugiyama::Engine::new();
        engine.set_spacing(spacing);
        engine
    }));

    let force = config.force().clone();
    chain.register(engine_factory(&[FORCE], move || {
        let mut engine = force::Engine::new();
        engine
            .set_iterations(force.iterations())
            .set_spring_constant(force.spring_constant())
            .set_repulsion_constant(force.repulsion_constant())
            .set_damping_factor(force.damping())
            .set_min_distance(spacing)
            .set_seed(force.seed());
        engine
    }));

    debug!(count = BUILTIN_TYPES.len(); "Registered built-in layout engines");
}

/// Wraps an engine constructor into a factory answering for `types`.
fn engine_factory<L, F>(types: &'static [&'static str], build: F) -> Box<LayoutFactory>
where
    L: Layout + 'static,
    F: Fn() -> L + 'static,
{
    Box::new(move |layout_type: &str, _graph: &LayoutGraph| {
        types
            .iter()
            .any(|candidate| *candidate == layout_type)
            .then(|| Box::new(build()) as Box<dyn Layout>)
    })
}
