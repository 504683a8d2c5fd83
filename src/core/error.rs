//! Typed errors for configuration and gold-file input.
//!
//! Everything else in the crate propagates `anyhow::Error`; these two are kept
//! distinct so callers can tell a bad input file from a failing subprocess.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid pattern in {field}: {pattern:?}: {source}")]
    Pattern {
        field: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid value for {field}: {message}")]
    Value { field: String, message: String },

    #[error("unknown unit {unit:?} (not present in ci.unit_map)")]
    UnknownUnit { unit: String },
}

impl ConfigError {
    pub fn value(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Value {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum GoldError {
    #[error("gold file is empty (no header row)")]
    Empty,

    #[error("gold file header is missing required column {0:?}")]
    MissingColumn(String),

    #[error("line {line}: {message}")]
    Row { line: usize, message: String },
}
