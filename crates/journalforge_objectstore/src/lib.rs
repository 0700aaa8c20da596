//! Object Store Adapter (C4): fetches the manifest and raw entry bodies by
//! key, behind a narrow trait so a production S3/R2-backed implementation
//! is a drop-in swap for the filesystem-backed one shipped here.

mod error;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::warn;

use journalforge_types::Manifest;

pub use error::{ObjectStoreError, Result};

/// How many times a transient I/O failure is retried before giving up, and
/// the fixed delay between attempts. The object store sees only local or
/// mounted-network filesystem failures here; a handful of short retries is
/// enough to ride out a flaky mount without masking real absence.
const MAX_ATTEMPTS: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_millis(200);

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch and parse `manifest.json`.
    async fn get_manifest(&self) -> Result<Manifest>;

    /// Fetch the raw bytes of one entry by its object-store key
    /// (`journals/{date}.md`, per the manifest's `r2Key` field).
    async fn get_entry_bytes(&self, key: &str) -> Result<Vec<u8>>;
}

/// Filesystem-backed adapter: a directory containing `manifest.json` and a
/// `journals/` subdirectory of per-entry files, mirroring the layout the
/// out-of-scope upload script produces against the real object store.
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    async fn read_with_retry(&self, path: &Path, key: &str) -> Result<Vec<u8>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match fs::read(path).await {
                Ok(bytes) => return Ok(bytes),
                Err(source) if source.kind() == std::io::ErrorKind::NotFound => {
                    return Err(ObjectStoreError::NotFound(key.to_string()));
                }
                Err(source) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(ObjectStoreError::Io {
                            key: key.to_string(),
                            source,
                        });
                    }
                    warn!(key, attempt, %source, "transient object store read failure, retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get_manifest(&self) -> Result<Manifest> {
        let path = self.manifest_path();
        let bytes = self.read_with_retry(&path, "manifest.json").await?;
        serde_json::from_slice(&bytes).map_err(|source| ObjectStoreError::ManifestInvalid {
            key: "manifest.json".to_string(),
            source,
        })
    }

    async fn get_entry_bytes(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(key);
        self.read_with_retry(&path, key).await
    }
}
