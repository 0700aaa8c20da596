//! Table creation for every persisted artifact family.
//!
//! All CREATE TABLE statements live here — single source of truth.

use crate::error::Result;
use crate::pool::DbPool;

/// Ensure every table the persistence layer and cache depend on exists.
pub async fn ensure_schema(pool: &DbPool) -> Result<()> {
    create_artifact_table(pool, "extractions").await?;
    create_artifact_table(pool, "weekly_summaries").await?;
    create_artifact_table(pool, "monthly_summaries").await?;
    create_artifact_table(pool, "quarterly_notepads").await?;
    create_artifact_table(pool, "synthesis").await?;
    create_pipeline_state_table(pool).await?;
    create_job_status_table(pool).await?;
    create_cache_table(pool).await?;
    Ok(())
}

/// Every artifact family shares the same row shape (§6: "Persisted state
/// layout" — `(id, natural-key, body-json, created-at)` at minimum, plus
/// the `input_hash` and `updated_at` columns this implementation adds).
async fn create_artifact_table(pool: &DbPool, table: &str) -> Result<()> {
    let sql = format!(
        r#"CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            natural_key TEXT NOT NULL UNIQUE,
            body_json TEXT NOT NULL,
            input_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#
    );
    sqlx::query(&sql).execute(pool).await?;

    let index_sql =
        format!("CREATE INDEX IF NOT EXISTS idx_{table}_natural_key ON {table}(natural_key)");
    sqlx::query(&index_sql).execute(pool).await?;
    Ok(())
}

async fn create_pipeline_state_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS pipeline_state (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            state_json TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_job_status_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS job_status (
            id TEXT PRIMARY KEY,
            job_kind TEXT NOT NULL,
            natural_key TEXT NOT NULL,
            input_hash TEXT NOT NULL,
            status TEXT NOT NULL,
            result_ref TEXT,
            last_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(job_kind, natural_key)
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_status_kind_status ON job_status(job_kind, status)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_cache_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS cache_entries (
            cache_key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL,
            expires_at TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;
    Ok(())
}
