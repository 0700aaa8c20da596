//! Content Cache (C2): opaque TTL-expiring key/value store, keyed by the
//! content hashes in `journalforge_types::hash`.
//!
//! A cache hit short-circuits a worker's gateway call entirely, but the
//! worker is still responsible for re-validating the cached body against
//! the current schema (§4.4 Non-goal note: a cached body may predate a
//! prompt-version bump, and `input_hash` already changes with
//! `PROMPT_VERSION`, but this layer does not know the caller's schema and
//! performs no such check itself).

use chrono::{Duration, Utc};
use sqlx::Row;

use crate::error::Result;
use crate::pool::DbPool;

#[derive(Clone)]
pub struct Cache {
    pool: DbPool,
}

impl Cache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Look up a cached value. An expired row is treated as a miss and is
    /// lazily deleted on read rather than via a background sweep.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value_json, expires_at FROM cache_entries WHERE cache_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: String = row.get("expires_at");
        let expires_at = chrono::DateTime::parse_from_rfc3339(&expires_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        if expires_at <= Utc::now() {
            self.evict(key).await?;
            return Ok(None);
        }

        Ok(Some(row.get::<String, _>("value_json")))
    }

    /// Store a value under `key` with a time-to-live in seconds.
    pub async fn put(&self, key: &str, value_json: &str, ttl_seconds: i64) -> Result<()> {
        let expires_at = (Utc::now() + Duration::seconds(ttl_seconds)).to_rfc3339();
        sqlx::query(
            "INSERT INTO cache_entries (cache_key, value_json, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(cache_key) DO UPDATE SET value_json = excluded.value_json, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value_json)
        .bind(&expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn evict(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE cache_key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
