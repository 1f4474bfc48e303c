use thiserror::Error;

use crate::vocabulary::SelectionError;

/// Reasons an analysis run does not start.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error(transparent)]
    Selection(#[from] SelectionError),
    #[error("no award records loaded; fetch a year or open a data file first")]
    NoRecords,
    #[error("failed to build matcher for tier `{tier}`: {message}")]
    Matcher { tier: String, message: String },
}

/// Failures while writing an exported document.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: the report has no matched awards")]
    Empty,
    #[error("failed to lay out PDF document: {0}")]
    Layout(String),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
