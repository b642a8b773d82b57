//! Error types for gridslice.
//!
//! Every failure the library can report is a variant of [`GridError`]. The
//! variants follow the taxonomy callers rely on: structural problems abort an
//! open, lookups degrade to `NotFound`, cursor and index problems are `Range`,
//! and anything going wrong while producing an output file is a `Write`.

use thiserror::Error;

/// The main error type for gridslice operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// NetCDF library errors
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A required dimension, variable or role is missing; the file cannot be used
    #[error("Structural error: {message}")]
    Structural { message: String },

    /// A named variable or attribute does not exist
    #[error("Not found: {name}")]
    NotFound { name: String },

    /// A cursor or explicit index is outside its valid range
    #[error("Range error: {message}")]
    Range { message: String },

    /// Writing a slice failed; the output file may be incomplete
    #[error("Write error: {message}")]
    Write { message: String },

    /// An element type has no mapping for the requested operation
    #[error("Unsupported type {element} for variable {variable}")]
    UnsupportedType { variable: String, element: String },

    /// Failures reported by an array store implementation
    #[error("Store error: {message}")]
    Store { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GridError {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        GridError::Structural {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(name: impl Into<String>) -> Self {
        GridError::NotFound { name: name.into() }
    }

    pub(crate) fn range(message: impl Into<String>) -> Self {
        GridError::Range {
            message: message.into(),
        }
    }

    pub(crate) fn store(message: impl Into<String>) -> Self {
        GridError::Store {
            message: message.into(),
        }
    }

    /// Wrap this error as a failed slice-write step.
    ///
    /// Unsupported types keep their own variant; everything else becomes
    /// `Write` with the step prefixed to the message.
    pub(crate) fn during_write(self, step: &str) -> Self {
        match self {
            err @ GridError::UnsupportedType { .. } => err,
            err @ GridError::Write { .. } => err,
            other => GridError::Write {
                message: format!("{}: {}", step, other),
            },
        }
    }
}

/// Convenience type alias for Results with GridError
pub type Result<T> = std::result::Result<T, GridError>;
