//! Persistence layer and content cache for journalforge.
//!
//! A single SQLite database backs both the Persistence Layer (C3 — durable
//! per-tier artifacts, job status, pipeline state) and the Content Cache
//! (C2 — TTL-expiring gateway-call memoization). They share one pool
//! rather than standing up a second storage engine; see DESIGN.md.

mod cache;
mod error;
mod persistence;
mod pool;
mod schema;

pub use cache::Cache;
pub use error::{DbError, Result};
pub use persistence::Persistence;
pub use pool::{create_pool, DbConfig, DbPool};

/// Open a pool, apply schema, and hand back both the persistence facade
/// and content cache sharing it.
pub async fn open(config: DbConfig) -> Result<(Persistence, Cache)> {
    let pool = create_pool(config).await?;
    schema::ensure_schema(&pool).await?;
    Ok((Persistence::new(pool.clone()), Cache::new(pool)))
}
