//! Error types for the orgviz core library.

/// Top-level error enum for the orgviz core library.
///
/// Per-item persistence failures are not represented here: they are collected
/// as data in [`crate::models::PersistResult`]. Everything in this enum
/// propagates to the caller.
#[derive(Debug, thiserror::Error)]
pub enum OrgVizError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tree depth {actual} does not match {expected} declared levels")]
    InvalidTree { expected: usize, actual: usize },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type OrgVizResult<T> = Result<T, OrgVizError>;
