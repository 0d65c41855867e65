//! CLI logic for the Trellis graph controller.
//!
//! The binary reads a JSON snapshot stream, replays it through a
//! [`Controller`], runs the bound layout, fits the viewport and writes the
//! result as SVG.

mod args;
mod config;
mod error;

pub use args::Args;
pub use error::CliError;

use std::fs;

use log::{debug, info, warn};

use trellis::{
    Controller,
    event::{ELEMENT_ADD, ELEMENT_REMOVE, Event},
    export::{self, Exporter, svg::SvgExporter},
    model::Model,
};

/// Run the Trellis CLI application
///
/// Every snapshot in the input is reconciled in order, so the output shows
/// the state after the last one.
///
/// # Errors
///
/// Returns [`CliError`] for:
/// - File I/O errors
/// - Configuration loading errors
/// - Malformed or rejected snapshots
/// - Layout and rendering errors
pub fn run(args: &Args) -> Result<(), CliError> {
    info!(
        input_path = args.input,
        output_path = args.output;
        "Processing snapshots"
    );

    let app_config = config::load_config(args.config.as_ref())?;

    let source = fs::read_to_string(&args.input).map_err(|source| CliError::Read {
        path: args.input.clone(),
        source,
    })?;
    let snapshots = parse_snapshots(&args.input, &source)?;

    let mut controller = Controller::new(app_config);
    log_structure_events(&mut controller);

    for (index, snapshot) in snapshots.iter().enumerate() {
        debug!(index, elements = snapshot.element_count(); "Replaying snapshot");
        controller
            .from_model(snapshot)
            .map_err(|source| CliError::Reconcile { index, source })?;
    }

    let mut graph = controller.graph_mut()?;
    if let Some(layout) = args.layout.as_deref() {
        graph.set_layout(Some(layout))?;
    }
    if graph.layout_type().is_none() {
        warn!("No layout bound, exporting model positions");
    }
    graph.layout()?;
    graph.fit_default();

    SvgExporter::new(&args.output)
        .export(&controller)
        .map_err(|err| match err {
            export::Error::Io(source) => CliError::Write {
                path: args.output.clone(),
                source,
            },
            err => CliError::Trellis(err.into()),
        })?;

    info!(output_file = args.output; "SVG exported successfully");

    Ok(())
}

/// Parses the input as one [`Model`] or an array of them.
///
/// # Errors
///
/// Returns [`CliError::Snapshot`] pointing at the first syntax or shape
/// error.
pub fn parse_snapshots(path: &str, source: &str) -> Result<Vec<Model>, CliError> {
    let result = if source.trim_start().starts_with('[') {
        serde_json::from_str::<Vec<Model>>(source)
    } else {
        serde_json::from_str::<Model>(source).map(|model| vec![model])
    };
    let snapshots = result.map_err(|err| CliError::snapshot(path, source, &err))?;
    info!(snapshots = snapshots.len(); "Parsed snapshots");
    Ok(snapshots)
}

fn log_structure_events(controller: &mut Controller) {
    for event_type in [ELEMENT_ADD, ELEMENT_REMOVE] {
        controller.add_event_listener(event_type, move |_: &mut Controller, event: &Event| {
            debug!(event = event_type, elements = event.len(); "Structure changed");
            Ok(())
        });
    }
}
