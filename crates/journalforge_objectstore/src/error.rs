//! Object Store Adapter errors.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ObjectStoreError>;

/// Errors surfaced by the Object Store Adapter (§7: `TransientNetwork` for
/// I/O failures here, `ManifestInvalid` for a malformed manifest).
#[derive(Error, Debug)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("io error reading {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("manifest at {key} is malformed: {source}")]
    ManifestInvalid {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
