//! Layered configuration: environment variables for secrets and endpoints,
//! an optional `config.toml` for tunables, CLI flags overriding both.
//!
//! A `#[serde(default = ...)]` field per tunable so a partial or absent
//! file still deserializes to sane defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("toml parse error in {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// The `[pipeline]` section of `config.toml`. Every field has a default
/// matching the spec's stated defaults, so an absent or partial file is
/// never an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineTunables {
    /// §4.5: parallelism band 5-10, default 8.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// §4.1: conservative default 50 requests/minute.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// §4.1: additional daily ceiling.
    #[serde(default = "default_daily_ceiling")]
    pub daily_ceiling: Option<u64>,

    /// §4.1: general retry ceiling for transient/5xx/timeout failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// §4.2: content-cache TTL, in seconds.
    #[serde(default = "default_cache_ttl_seconds")]
    pub cache_ttl_seconds: i64,
}

fn default_max_concurrent_jobs() -> usize {
    8
}

fn default_requests_per_minute() -> u32 {
    50
}

fn default_daily_ceiling() -> Option<u64> {
    Some(5_000)
}

fn default_max_retries() -> u32 {
    3
}

fn default_cache_ttl_seconds() -> i64 {
    7 * 24 * 3600
}

impl Default for PipelineTunables {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            requests_per_minute: default_requests_per_minute(),
            daily_ceiling: default_daily_ceiling(),
            max_retries: default_max_retries(),
            cache_ttl_seconds: default_cache_ttl_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RootConfig {
    #[serde(default)]
    pipeline: Option<PipelineTunables>,
}

/// Load `[pipeline]` tunables from a `config.toml` path. A missing file is
/// not an error — it resolves to all-default tunables rather than failing
/// the run.
pub fn load_pipeline_tunables(path: &Path) -> Result<PipelineTunables> {
    if !path.exists() {
        return Ok(PipelineTunables::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let root: RootConfig = toml::from_str(&raw).map_err(|source| ConfigError::Toml {
        path: path.display().to_string(),
        source,
    })?;
    Ok(root.pipeline.unwrap_or_default())
}

/// Default `config.toml` location: `~/.journalforge/config.toml`, unless
/// overridden.
pub fn default_config_path() -> PathBuf {
    journalforge_logging::journalforge_home().join("config.toml")
}
