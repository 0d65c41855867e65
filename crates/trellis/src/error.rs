//! Error types for Trellis operations.
//!
//! This module provides the main error type [`Error`] which wraps the
//! failures a [`Controller`](crate::Controller) can report.

use thiserror::Error;

use trellis_core::identifier::Id;

use crate::{event::ListenerError, export, layout::LayoutError};

/// The main error type for Trellis operations.
///
/// Snapshot-level inconsistencies (unknown child ids, cyclic children,
/// dangling edge endpoints) are tolerated and logged during reconciliation.
/// Only structurally unusable input and failed direct operations surface
/// here.
#[derive(Debug, Error)]
pub enum Error {
    /// A required collaborator is missing: no graph has been set, or no
    /// factory matched a component or layout request.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Duplicate element id `{0}`")]
    DuplicateId(Id),

    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Element `{0}` not found")]
    NotFound(Id),

    #[error("Layout error: {0}")]
    Layout(#[from] LayoutError),

    #[error("Listener error: {0}")]
    Listener(#[from] ListenerError),

    #[error("Export error: {0}")]
    Export(#[from] export::Error),
}

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
