//! confstore-utils: Common utilities shared across confstore crates
//!
//! This crate provides:
//! - Unified error types ([`StoreError`], [`Result`])
//! - Logging infrastructure ([`init_logging`], [`LogConfig`])
//! - XDG-compliant log directory utilities ([`paths`] module)

pub mod error;
pub mod logging;
pub mod paths;

// Re-export main types at crate root for convenience
pub use error::{Result, StoreError};
pub use logging::{init_logging, init_logging_with_config, LogConfig, LogOutput};

// Re-export commonly used path functions
pub use paths::{ensure_dir, ensure_parent, log_dir, state_dir};
