//! Error types for newsroom-tracking-core
//!
//! The tracking façade itself never hands errors to UI callers. These are
//! returned by the storage, configuration and logging layers.

use thiserror::Error;

/// Main error type for the newsroom-tracking-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Deferred identity storage error
    #[error("storage error: {0}")]
    Storage(String),
}

/// Result type alias for newsroom-tracking-core
pub type Result<T> = std::result::Result<T, Error>;
