//! Error types for structmd library.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for structmd operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors that abort a conversion.
///
/// Everything else (bad spans, provider trouble, broken links) is reported as
/// a [`crate::diagnostics::Warning`] and the conversion still completes.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The page source could not produce pages (unreadable or corrupt input).
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The caller cancelled the conversion.
    #[error("Conversion cancelled")]
    Cancelled,

    /// Options failed validation.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),
}

/// Errors a semantic classification provider can report.
///
/// These never escape the overlay merger; they are turned into warnings and
/// the affected spans keep their heuristic classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider did not answer in time.
    #[error("provider timed out after {0:?}")]
    Timeout(Duration),

    /// The provider reported a failure of its own.
    #[error("provider failed: {0}")]
    Failed(String),

    /// The provider answered with something that is not a hint mapping.
    #[error("malformed provider response: {0}")]
    Malformed(String),

    /// The provider worker went away without answering (e.g. it panicked).
    #[error("provider disconnected without a response")]
    Disconnected,
}
