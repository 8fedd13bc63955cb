//! Core error types for Trellis
//!
//! All errors are explicit - no silent failures allowed.

use thiserror::Error;

/// Top-level error type for Trellis operations
#[derive(Debug, Error)]
pub enum TrellisError {
    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },
}

/// Convenience type alias for Trellis results
pub type TrellisResult<T> = Result<T, TrellisError>;
