//! Coordinator error kinds.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoordinatorError>;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// `start` was called while the pipeline is not `idle`, or the
    /// pipeline reached an otherwise illegal phase change.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The manifest fetched from the object store failed its own
    /// structural validation.
    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    /// `start` or `run` was called while another call already holds the
    /// run lock.
    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error("object store error: {0}")]
    ObjectStore(#[from] journalforge_objectstore::ObjectStoreError),

    #[error("database error: {0}")]
    Db(#[from] journalforge_db::DbError),

    #[error("worker error: {0}")]
    Worker(#[from] journalforge_worker::WorkerError),
}

impl CoordinatorError {
    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    pub fn manifest_invalid(msg: impl Into<String>) -> Self {
        Self::ManifestInvalid(msg.into())
    }
}
