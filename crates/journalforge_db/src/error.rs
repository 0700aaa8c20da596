//! Error types for the persistence layer.

use thiserror::Error;

/// Database operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Persistence-layer errors (§7: `TransientNetwork` surfaces through here
/// for connection-level failures; `InvalidTransition` is built on top of
/// `InvalidState`).
#[derive(Error, Debug)]
pub enum DbError {
    /// SQLx error (connection, query, pool exhaustion, etc.)
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error opening or creating the database file.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid state transition (e.g. `start` while not `idle`).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Serialization error (artifact body JSON round-trip).
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
