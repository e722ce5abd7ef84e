//! Unified error types for the Arsen workspace.
//!
//! Loaders, disassemblers, the analysis engine, and project persistence all
//! report failures through [`ArsenError`]; binaries convert it into
//! `anyhow::Error` at the edge.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum ArsenError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value or call sequence is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// A binary image is truncated or structurally invalid.
    #[error("malformed {format} image: {message}")]
    Malformed {
        /// Format being parsed when the problem was found.
        format: &'static str,
        /// Description of the structural problem.
        message: String,
    },

    /// The requested operation is not supported for this input.
    #[error("unsupported: {message}")]
    Unsupported {
        /// Description of what is unsupported.
        message: String,
    },

    /// A background task died before producing a result.
    #[error("internal error: {message}")]
    Internal {
        /// What failed.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

impl ArsenError {
    /// Builds an [`ArsenError::Io`] for the given path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds an [`ArsenError::Malformed`] error.
    pub fn malformed(format: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ArsenError>;
