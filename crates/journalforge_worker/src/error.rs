//! Worker error kinds (§7: `ContentDrift`, `SchemaValidation`,
//! `PermanentJob`, `DependencyMissing` all surface through here).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The fetched entry's content hash no longer matches the manifest's
    /// recorded hash for that date (§4.5 step 2).
    #[error("content drift on {date}: manifest hash no longer matches fetched bytes")]
    ContentDrift { date: String },

    /// Two parse/validate attempts both failed against the declared shape.
    #[error("schema validation failed after retry: {0}")]
    SchemaValidation(String),

    /// The job's input set is empty — no extraction/aggregate exists yet
    /// for this range (§4.6: the caller should treat this as a no-op
    /// success rather than a failure).
    #[error("dependency missing: no inputs available for this range")]
    DependencyMissing,

    /// The gateway exhausted its own retry budget; from the worker's
    /// perspective this job attempt has failed outright.
    #[error("llm gateway call failed: {0}")]
    Gateway(#[from] journalforge_llm::GatewayError),

    #[error("object store error: {0}")]
    ObjectStore(#[from] journalforge_objectstore::ObjectStoreError),

    #[error("database error: {0}")]
    Db(#[from] journalforge_db::DbError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
