//! CLI error type with miette diagnostics.
//!
//! Library errors carry no source text, so the CLI wraps them in
//! [`CliError`], which knows which file and which snapshot failed. Snapshot
//! syntax errors point at the offending line of the input file.

use std::io;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors reported by the `trellis` binary.
#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Failed to read `{path}`")]
    #[diagnostic(
        code(trellis::io::read),
        help("check that the input file exists and is readable")
    )]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write `{path}`")]
    #[diagnostic(code(trellis::io::write))]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid snapshot: {message}")]
    #[diagnostic(
        code(trellis::snapshot::syntax),
        help("the input must be a model object or an array of model objects")
    )]
    Snapshot {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error(transparent)]
    #[diagnostic(
        code(trellis::config),
        help("see the [viewport], [layout] and [events] sections of the configuration")
    )]
    Config(#[from] ConfigError),

    #[error("Snapshot #{index} was rejected")]
    #[diagnostic(
        code(trellis::snapshot::rejected),
        help("every model needs a non-empty id, and an id cannot change kind")
    )]
    Reconcile {
        index: usize,
        #[source]
        source: trellis::Error,
    },

    #[error(transparent)]
    #[diagnostic(code(trellis::render))]
    Trellis(#[from] trellis::Error),
}

impl CliError {
    /// Builds a [`CliError::Snapshot`] from a JSON error, labelling the
    /// position serde reported.
    pub fn snapshot(path: &str, source: &str, err: &serde_json::Error) -> Self {
        let offset = byte_offset(source, err.line(), err.column());
        Self::Snapshot {
            message: err.to_string(),
            src: NamedSource::new(path, source.to_string()),
            span: SourceSpan::from((offset, 0)),
        }
    }
}

/// Converts a 1-based line and column into a byte offset, clamped to the
/// source length.
fn byte_offset(source: &str, line: usize, column: usize) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(source.len())
}
