//! Error types for the Fairscope engine.
//!
//! Uses `thiserror` for public API error types. Input validation is the only
//! fatal failure class inside the engine itself; dataset loading and
//! configuration have their own variants so callers can tell them apart.

use std::path::PathBuf;

/// Top-level error type for the Fairscope core library.
#[derive(Debug, thiserror::Error)]
pub enum FairscopeError {
    #[error("Input validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Dataset source error: {0}")]
    Source(#[from] SourceError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),
}

/// Input rejected before any computation starts.
///
/// Every variant is fatal for the run: the orchestrator moves to `Failed`
/// without emitting progress or exposing partial metrics.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Dataset contains no records")]
    EmptyDataset,

    #[error("No protected attributes configured for analysis")]
    NoProtectedAttributes,

    #[error("Unknown protected attribute: {name}")]
    UnknownAttribute { name: String },

    #[error("Record {index} has no value for protected attribute '{attribute}'")]
    MissingAttribute { index: usize, attribute: String },

    #[error("Record {index} has predicted score {score} outside [0, 1]")]
    ScoreOutOfRange { index: usize, score: f64 },

    #[error("Threshold '{name}' = {value} is outside [0, 1]")]
    ThresholdOutOfRange { name: String, value: f64 },

    #[error("Invalid analysis configuration: {message}")]
    InvalidConfig { message: String },
}

/// Errors from loading a dataset off disk.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON at {location}: {source}")]
    Json {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },

    #[error("Missing column '{column}' in CSV header")]
    MissingColumn { column: String },

    #[error("Unsupported dataset format: {format}")]
    UnsupportedFormat { format: String },
}

/// A type alias for results using the top-level `FairscopeError`.
pub type Result<T> = std::result::Result<T, FairscopeError>;
