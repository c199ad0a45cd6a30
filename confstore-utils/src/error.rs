//! Error types for confstore
//!
//! Provides a unified error type used across all confstore crates.

use std::path::PathBuf;

/// Main error type for confstore operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    // === IO Errors ===

    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration at {path}: {message}")]
    ConfigInvalid { path: PathBuf, message: String },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(String),

    // === Runtime Errors ===

    #[error("Flush runtime error: {0}")]
    Runtime(String),

    // === Internal Errors ===

    #[error("Internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a serialization error
    pub fn serialize(msg: impl Into<String>) -> Self {
        Self::Serialize(msg.into())
    }

    /// Create a runtime error
    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Check if this error means the stored document cannot be loaded.
    ///
    /// A store that hits one of these at startup does not fall back to
    /// defaults; the process is expected to stop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigInvalid { .. } | Self::FileRead { .. }
        )
    }
}

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;
