//! Trellis - a renderer-independent graph visualization controller.
//!
//! A [`Controller`] maintains a live tree of graph, node and edge elements,
//! reconciles it against declarative [`model::Model`] snapshots, delegates
//! positioning to pluggable [`layout::Layout`] strategies, resolves visual
//! [`component::Component`]s through ordered factory chains and emits
//! batched structural events.
//!
//! # Examples
//!
//! ```
//! use trellis::{
//!     Controller,
//!     event::{ELEMENT_REMOVE, Event},
//!     model::{GraphModel, Model, NodeModel},
//! };
//!
//! let mut controller = Controller::default();
//! controller.add_event_listener(ELEMENT_REMOVE, |_: &mut Controller, event: &Event| {
//!     println!("removed {:?}", event.ids());
//!     Ok(())
//! });
//!
//! let graph = GraphModel::new("g", "graph").with_layout("grid");
//! controller
//!     .from_model(&Model::new()
//!         .with_graph(graph.clone())
//!         .with_nodes(vec![NodeModel::new("n1", "node").with_size(80.0, 40.0)]))
//!     .unwrap();
//! controller.graph_mut().unwrap().layout().unwrap();
//!
//! let svg = trellis::render_svg(&controller).unwrap();
//! assert!(svg.contains("<svg"));
//!
//! controller.from_model(&Model::new().with_graph(graph)).unwrap();
//! assert!(controller.get_node_by_id("n1".into()).is_none());
//! ```

pub mod component;
pub mod config;
pub mod element;
pub mod event;
pub mod export;
pub mod factory;
pub mod graph;
pub mod layout;

mod controller;
mod error;
mod transaction;

pub use trellis_core::{geometry, identifier, model};

pub use controller::Controller;
pub use error::{Error, Result};

use log::info;

/// Renders the controller's graph to an SVG string.
///
/// # Errors
///
/// Returns [`Error::Export`] if no graph is set or an element has no
/// component.
pub fn render_svg(controller: &Controller) -> Result<String> {
    let doc = export::svg::SvgExporter::default().render(controller)?;
    info!(elements = controller.elements().len(); "SVG rendered successfully");
    Ok(doc.to_string())
}
