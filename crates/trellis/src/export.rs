//! Export of the live graph to output formats.
//!
//! Exporters walk the controller's element tree, resolve each element's
//! [`Component`](crate::component::Component) and turn the resulting
//! visuals into an output document.
//!
//! # Available Backends
//!
//! - [`svg`] - SVG output via [`svg::SvgExporter`]
//!
//! # Error Handling
//!
//! Export operations return [`Error`], covering rendering failures and I/O
//! errors. [`Error`] converts into [`crate::Error::Export`] at the crate
//! boundary.

mod layer;
pub mod svg;

use crate::controller::Controller;

/// Abstraction for export backends.
pub trait Exporter {
    /// Exports the graph tracked by `controller`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Render`] if the graph cannot be rendered, or
    /// [`Error::Io`] if writing the output fails.
    fn export(&mut self, controller: &Controller) -> Result<(), Error>;
}

/// Errors that can occur during export.
#[derive(Debug)]
pub enum Error {
    /// A rendering failure described by `message`.
    Render(String),
    /// An I/O error encountered while writing output.
    Io(std::io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Render(msg) => write!(f, "Render error: {msg}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(_) => None,
            Self::Io(err) => Some(err),
        }
    }
}
