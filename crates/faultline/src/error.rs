//! Error types for the faultline crate.

use std::io;

/// Errors that can occur inside the fault pipeline itself.
///
/// These are distinct from the faults the pipeline *captures*: a
/// `FaultlineError` means the capture machinery could not do its job
/// (bad configuration, an unparseable remote report, a layer violation
/// in strict mode), never that an application fault occurred.
#[derive(Debug, thiserror::Error)]
pub enum FaultlineError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON decoding error.
    #[error("JSON decode error: {source}")]
    JsonDecode { source: serde_json::Error },

    /// A remote fault report could not be converted to the intake shape.
    #[error("invalid fault report: {0}")]
    InvalidReport(String),

    /// A fault kind was raised from a layer that does not permit it
    /// (strict mode only; default mode downgrades this to a warning).
    #[error("layer violation: {code} not permitted at {file}:{line} (allowed: {allowed})")]
    LayerViolation {
        /// Machine code of the offending fault kind.
        code: String,
        /// Source file the fault originated from.
        file: String,
        /// Line number the fault originated from.
        line: u32,
        /// Comma-separated codes permitted at that location.
        allowed: String,
    },

    /// The fault sink rejected a record.
    #[error("sink error: {0}")]
    Sink(String),
}
