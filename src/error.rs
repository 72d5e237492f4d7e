//! Error types for workbook exports

use thiserror::Error;

/// Result type alias for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

/// Structural failures that abort an export.
///
/// Partial degradation (a single attachment that cannot be downloaded, a
/// malformed field value) never surfaces here; it is absorbed by the asset
/// pipeline and recorded in the workbook instead.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The form has no exportable columns
    #[error("No columns available for export")]
    NoColumns,

    /// The column selection did not match any available column
    #[error("No columns selected for export")]
    NoColumnsSelected,

    /// The destination archive (or its staging file) could not be created
    #[error("Unable to create workbook archive at '{path}': {reason}")]
    ArchiveOpen { path: String, reason: String },

    /// Writing or finishing the ZIP container failed
    #[error("Failed to write workbook archive: {0}")]
    ArchiveWrite(String),

    /// The finished archive could not be moved to its destination
    #[error("Failed to move workbook into place at '{path}': {reason}")]
    Persist { path: String, reason: String },

    /// Invalid cell reference
    #[error("Invalid cell reference: {0}")]
    InvalidCell(String),

    /// The HTTP client for attachment downloads could not be built
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClient(String),

    /// IO error wrapper
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ExportError {
    pub(crate) fn archive_write<E: std::fmt::Display>(err: E) -> Self {
        ExportError::ArchiveWrite(err.to_string())
    }
}

/// Why a remote attachment could not be used.
///
/// Recoverable: the caller falls back to writing the URL as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("empty response body")]
    EmptyBody,

    #[error("response is not a recognizable image")]
    NotAnImage,

    #[error("fetching is disabled")]
    Offline,
}
