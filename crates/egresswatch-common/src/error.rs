//! Unified error types for the egresswatch workspace.
//!
//! Each higher-level crate wraps these common variants rather than defining
//! its own enum; the taxonomy is small enough that one type covers it.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum EgressWatchError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// The sandbox runtime rejected or failed a launch.
    ///
    /// Callers downgrade this to a warning plus a degraded run result;
    /// it never aborts the pipeline.
    #[error("sandbox error: {message}")]
    Sandbox {
        /// Description of the sandbox failure.
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

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, EgressWatchError>;
