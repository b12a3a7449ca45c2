//! Error types for gann_fan

use crate::pivot::PivotKind;
use thiserror::Error;

/// Main error type for fan construction
#[derive(Error, Debug)]
pub enum GannError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Insufficient data for {context}: required {required} bars, available {available}")]
    InsufficientData {
        context: String,
        required: usize,
        available: usize,
    },

    #[error(
        "No pivot {kind} found using {mode}. Try lowering the threshold/multiplier \
         or providing more data"
    )]
    NoPivotFound { kind: PivotKind, mode: String },

    #[error("Undefined {what} at index {index}: {reason}")]
    UndefinedValue {
        what: String,
        index: usize,
        reason: String,
    },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl GannError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        GannError::ConfigError(msg.into())
    }

    pub(crate) fn undefined(what: impl Into<String>, index: usize, reason: impl Into<String>) -> Self {
        GannError::UndefinedValue {
            what: what.into(),
            index,
            reason: reason.into(),
        }
    }
}

/// Result type alias for gann_fan operations
pub type Result<T> = std::result::Result<T, GannError>;
