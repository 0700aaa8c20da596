//! Persistence Layer (C3): narrow typed operations over durable per-tier
//! artifact tables, plus pipeline-state and job-status rows.
//!
//! All `store*` operations are upsert-by-key. All `get*Range` operations
//! return results in ascending natural-key order. No transactions span
//! artifact tables — idempotency derives from deterministic keys plus
//! content-hash short-circuiting in the workers, not from locking.

use chrono::{NaiveDate, Utc};
use sqlx::Row;

use journalforge_types::range::{MonthKey, QuarterKey, WeekStart};
use journalforge_types::{
    Extraction, JobKind, JobStatus, JobStatusRecord, MonthlySummary, PipelineState,
    QuarterlyNotepad, Synthesis, WeeklySummary,
};

use crate::error::{DbError, Result};
use crate::pool::DbPool;
use crate::schema;

/// Facade over every artifact family, pipeline state, and job status.
///
/// One typed surface per concern, backed by a single pool, with no
/// cross-table transactions.
#[derive(Clone)]
pub struct Persistence {
    pool: DbPool,
}

impl Persistence {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn init(&self) -> Result<()> {
        schema::ensure_schema(&self.pool).await
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // ---------------------------------------------------------------
    // Generic artifact upsert/get, shared by every tier's store.
    // ---------------------------------------------------------------

    async fn upsert_artifact(
        &self,
        table: &str,
        natural_key: &str,
        body_json: &str,
        input_hash: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let sql = format!(
            "INSERT INTO {table} (natural_key, body_json, input_hash, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT(natural_key) DO UPDATE SET \
             body_json = excluded.body_json, input_hash = excluded.input_hash, updated_at = excluded.updated_at"
        );
        sqlx::query(&sql)
            .bind(natural_key)
            .bind(body_json)
            .bind(input_hash)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_artifact_body(&self, table: &str, natural_key: &str) -> Result<Option<String>> {
        let sql = format!("SELECT body_json FROM {table} WHERE natural_key = ?");
        let row = sqlx::query(&sql)
            .bind(natural_key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("body_json")))
    }

    async fn get_artifact_bodies_ordered(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT body_json FROM {table} ORDER BY natural_key ASC");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("body_json")).collect())
    }

    /// Natural keys present in `table`, used by the Coordinator to compare
    /// "expected range-ids" against "persisted artifacts" for tier
    /// completion detection (§4.7) without counting events.
    pub async fn existing_keys(&self, table: &str) -> Result<Vec<String>> {
        let sql = format!("SELECT natural_key FROM {table}");
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.get::<String, _>("natural_key")).collect())
    }

    // ---------------------------------------------------------------
    // Extractions
    // ---------------------------------------------------------------

    pub async fn store_extraction(&self, extraction: &Extraction, input_hash: &str) -> Result<()> {
        let key = extraction.entry_date.format("%Y-%m-%d").to_string();
        let body = serde_json::to_string(extraction)?;
        self.upsert_artifact("extractions", &key, &body, input_hash).await
    }

    pub async fn get_extraction(&self, date: NaiveDate) -> Result<Option<Extraction>> {
        let key = date.format("%Y-%m-%d").to_string();
        match self.get_artifact_body("extractions", &key).await? {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// Ascending date order; length equals the count of dates with a
    /// stored extraction within `[start, end]` (§8 round-trip law).
    pub async fn get_extractions_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Extraction>> {
        let start_key = start.format("%Y-%m-%d").to_string();
        let end_key = end.format("%Y-%m-%d").to_string();
        let rows = sqlx::query(
            "SELECT body_json FROM extractions WHERE natural_key BETWEEN ? AND ? ORDER BY natural_key ASC",
        )
        .bind(&start_key)
        .bind(&end_key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("body_json")).map_err(DbError::from))
            .collect()
    }

    // ---------------------------------------------------------------
    // Weekly summaries
    // ---------------------------------------------------------------

    pub async fn store_weekly_summary(&self, summary: &WeeklySummary, input_hash: &str) -> Result<()> {
        let body = serde_json::to_string(summary)?;
        self.upsert_artifact("weekly_summaries", &summary.natural_key(), &body, input_hash)
            .await
    }

    pub async fn get_weekly_summary(&self, week_start: WeekStart) -> Result<Option<WeeklySummary>> {
        match self
            .get_artifact_body("weekly_summaries", &week_start.as_key())
            .await?
        {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    /// All weekly summaries whose `week_start` falls in `[month.first_day,
    /// month.next_month_first_day)` — the overlap rule fixing a
    /// week-straddling-a-month-boundary to "week-start's month" (§4.6).
    pub async fn get_weekly_summaries_for_month(&self, month: MonthKey) -> Result<Vec<WeeklySummary>> {
        let start_key = month.first_day().format("%Y-%m-%d").to_string();
        let end_key = month.next_month_first_day().format("%Y-%m-%d").to_string();
        let rows = sqlx::query(
            "SELECT body_json FROM weekly_summaries WHERE natural_key >= ? AND natural_key < ? ORDER BY natural_key ASC",
        )
        .bind(&start_key)
        .bind(&end_key)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| serde_json::from_str(&r.get::<String, _>("body_json")).map_err(DbError::from))
            .collect()
    }

    pub async fn get_all_weekly_summaries(&self) -> Result<Vec<WeeklySummary>> {
        self.get_artifact_bodies_ordered("weekly_summaries")
            .await?
            .into_iter()
            .map(|body| serde_json::from_str(&body).map_err(DbError::from))
            .collect()
    }

    // ---------------------------------------------------------------
    // Monthly summaries
    // ---------------------------------------------------------------

    pub async fn store_monthly_summary(&self, summary: &MonthlySummary, input_hash: &str) -> Result<()> {
        let body = serde_json::to_string(summary)?;
        self.upsert_artifact("monthly_summaries", &summary.natural_key(), &body, input_hash)
            .await
    }

    pub async fn get_monthly_summary(&self, month: MonthKey) -> Result<Option<MonthlySummary>> {
        match self
            .get_artifact_body("monthly_summaries", &month.as_key())
            .await?
        {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    pub async fn get_monthly_summaries_for_quarter(
        &self,
        quarter: QuarterKey,
    ) -> Result<Vec<MonthlySummary>> {
        let mut out = Vec::with_capacity(3);
        for month in quarter.months() {
            if let Some(summary) = self.get_monthly_summary(month).await? {
                out.push(summary);
            }
        }
        out.sort_by(|a, b| a.natural_key().cmp(&b.natural_key()));
        Ok(out)
    }

    // ---------------------------------------------------------------
    // Quarterly notepads
    // ---------------------------------------------------------------

    pub async fn store_quarterly_notepad(&self, notepad: &QuarterlyNotepad, input_hash: &str) -> Result<()> {
        let body = serde_json::to_string(notepad)?;
        self.upsert_artifact("quarterly_notepads", &notepad.natural_key(), &body, input_hash)
            .await
    }

    pub async fn get_quarterly_notepad(&self, quarter: QuarterKey) -> Result<Option<QuarterlyNotepad>> {
        match self
            .get_artifact_body("quarterly_notepads", &quarter.as_key())
            .await?
        {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    pub async fn get_all_quarterly_notepads(&self) -> Result<Vec<QuarterlyNotepad>> {
        self.get_artifact_bodies_ordered("quarterly_notepads")
            .await?
            .into_iter()
            .map(|body| serde_json::from_str(&body).map_err(DbError::from))
            .collect()
    }

    // ---------------------------------------------------------------
    // Synthesis (singleton)
    // ---------------------------------------------------------------

    pub async fn store_synthesis(&self, synthesis: &Synthesis, input_hash: &str) -> Result<()> {
        let body = serde_json::to_string(synthesis)?;
        self.upsert_artifact("synthesis", synthesis.natural_key(), &body, input_hash)
            .await
    }

    pub async fn get_synthesis(&self) -> Result<Option<Synthesis>> {
        match self
            .get_artifact_body("synthesis", journalforge_types::synthesis::SYNTHESIS_KEY)
            .await?
        {
            Some(body) => Ok(Some(serde_json::from_str(&body)?)),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Job status
    // ---------------------------------------------------------------

    /// Upsert a job-status row, enforcing the monotonicity invariant
    /// (§8): `succeeded`/`dead_lettered` are terminal and must not
    /// regress. Returns `InvalidState` if the caller attempts an illegal
    /// transition on an existing row.
    pub async fn upsert_job_status(&self, record: &JobStatusRecord) -> Result<()> {
        if let Some(existing) = self.get_job_status(record.kind, &record.natural_key).await? {
            if existing.status.is_terminal() && existing.status != record.status {
                return Err(DbError::invalid_state(format!(
                    "job {} is terminal ({}), refusing transition to {}",
                    record.id, existing.status, record.status
                )));
            }
        }

        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO job_status (id, job_kind, natural_key, input_hash, status, result_ref, last_error, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(job_kind, natural_key) DO UPDATE SET \
             status = excluded.status, input_hash = excluded.input_hash, result_ref = excluded.result_ref, \
             last_error = excluded.last_error, updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(record.kind.as_db_str())
        .bind(&record.natural_key)
        .bind(&record.input_hash)
        .bind(record.status.as_str())
        .bind(&record.result_ref)
        .bind(&record.last_error)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_job_status(&self, kind: JobKind, natural_key: &str) -> Result<Option<JobStatusRecord>> {
        let row = sqlx::query(
            "SELECT id, job_kind, natural_key, input_hash, status, result_ref, last_error, created_at, updated_at \
             FROM job_status WHERE job_kind = ? AND natural_key = ?",
        )
        .bind(kind.as_db_str())
        .bind(natural_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(row_to_job_status).transpose()
    }

    /// Every job-status row for a given kind, used by the Coordinator to
    /// compare against expected range-ids at tier-completion time.
    pub async fn get_job_statuses_for_kind(&self, kind: JobKind) -> Result<Vec<JobStatusRecord>> {
        let rows = sqlx::query(
            "SELECT id, job_kind, natural_key, input_hash, status, result_ref, last_error, created_at, updated_at \
             FROM job_status WHERE job_kind = ? ORDER BY natural_key ASC",
        )
        .bind(kind.as_db_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(row_to_job_status).collect()
    }

    // ---------------------------------------------------------------
    // Pipeline state (singleton)
    // ---------------------------------------------------------------

    pub async fn put_pipeline_state(&self, state: &PipelineState) -> Result<()> {
        let body = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO pipeline_state (id, state_json, updated_at) VALUES (1, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET state_json = excluded.state_json, updated_at = excluded.updated_at",
        )
        .bind(&body)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get_pipeline_state(&self) -> Result<PipelineState> {
        let row = sqlx::query("SELECT state_json FROM pipeline_state WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(serde_json::from_str(&row.get::<String, _>("state_json"))?),
            None => Ok(PipelineState::default()),
        }
    }
}

fn row_to_job_status(row: sqlx::sqlite::SqliteRow) -> Result<JobStatusRecord> {
    let kind_str: String = row.get("job_kind");
    let status_str: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(JobStatusRecord {
        id: row.get("id"),
        kind: kind_str
            .parse()
            .map_err(|e: String| DbError::invalid_state(e))?,
        natural_key: row.get("natural_key"),
        input_hash: row.get("input_hash"),
        status: status_str
            .parse::<JobStatus>()
            .map_err(DbError::invalid_state)?,
        result_ref: row.get("result_ref"),
        last_error: row.get("last_error"),
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DbError::invalid_state(e.to_string()))?,
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| DbError::invalid_state(e.to_string()))?,
    })
}
