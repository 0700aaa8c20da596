//! Shared job-dispatch bookkeeping used by both the extraction and
//! aggregation drive loops: idempotent-replay short-circuiting,
//! job-status transitions, and the bounded-replay/dead-letter decision
//! of §7.

use journalforge_db::Persistence;
use journalforge_types::{JobKind, JobStatus, JobStatusRecord};
use journalforge_worker::WorkerError;

use crate::error::{CoordinatorError, Result};

/// Outcome of driving one job to a terminal state, as reported back to
/// the tier loop for pipeline-state bookkeeping.
#[derive(Debug)]
pub enum JobOutcome {
    /// The job produced (or reused) an artifact.
    Succeeded,
    /// A pre-existing `succeeded` job status with a matching input hash
    /// made the dispatch itself a no-op (§3 Relationships and
    /// invariants): the job was never handed to the worker at all.
    SkippedAlreadySucceeded,
    /// An aggregator found zero inputs for its range (§7
    /// `DependencyMissing`): no artifact was produced, but the job is
    /// not a failure.
    SkippedNoInputs,
    /// The job exhausted its replay budget and was dead-lettered; the
    /// tier completes but records a warning (§4.7 failure handling).
    DeadLettered { message: String },
}

/// Whether `get_job_status` already records this exact job (same input
/// hash) as `succeeded` — if so, dispatching it again is a no-op.
pub async fn already_succeeded(
    persistence: &Persistence,
    kind: JobKind,
    natural_key: &str,
    input_hash: &str,
) -> Result<bool> {
    let existing = persistence.get_job_status(kind, natural_key).await?;
    Ok(matches!(
        existing,
        Some(record) if record.status == JobStatus::Succeeded && record.input_hash == input_hash
    ))
}

pub async fn mark_running(
    persistence: &Persistence,
    kind: JobKind,
    natural_key: &str,
    input_hash: &str,
) -> Result<()> {
    let record = JobStatusRecord {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        natural_key: natural_key.to_string(),
        input_hash: input_hash.to_string(),
        status: JobStatus::Running,
        result_ref: None,
        last_error: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    persistence.upsert_job_status(&record).await?;
    Ok(())
}

pub async fn mark_succeeded(
    persistence: &Persistence,
    kind: JobKind,
    natural_key: &str,
    input_hash: &str,
    result_ref: Option<&str>,
) -> Result<()> {
    let record = JobStatusRecord {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        natural_key: natural_key.to_string(),
        input_hash: input_hash.to_string(),
        status: JobStatus::Succeeded,
        result_ref: result_ref.map(str::to_string),
        last_error: None,
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    persistence.upsert_job_status(&record).await?;
    Ok(())
}

pub async fn mark_dead_lettered(
    persistence: &Persistence,
    kind: JobKind,
    natural_key: &str,
    input_hash: &str,
    error: &str,
) -> Result<()> {
    let record = JobStatusRecord {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        natural_key: natural_key.to_string(),
        input_hash: input_hash.to_string(),
        status: JobStatus::DeadLettered,
        result_ref: None,
        last_error: Some(error.to_string()),
        created_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
    };
    persistence.upsert_job_status(&record).await?;
    Ok(())
}

/// Classify a [`WorkerError`] into "retryable within the job's replay
/// budget" vs. "permanent, dead-letter now" (§7). `ContentDrift` and
/// `SchemaValidation` have already exhausted their own recovery paths
/// (the manifest genuinely diverged; the worker already retried the
/// gateway call once) so a further identical attempt cannot help.
pub fn classify(err: &WorkerError) -> (String, bool) {
    match err {
        WorkerError::ContentDrift { .. } => (err.to_string(), false),
        WorkerError::SchemaValidation(_) => (err.to_string(), false),
        WorkerError::DependencyMissing => (err.to_string(), false),
        WorkerError::Gateway(_) | WorkerError::ObjectStore(_) | WorkerError::Db(_) => {
            (err.to_string(), true)
        }
        WorkerError::Serialization(_) => (err.to_string(), false),
    }
}

/// Marker `input_hash` recorded for an aggregation job that found zero
/// inputs (§7 `DependencyMissing`): there is no real input set to hash.
const NO_INPUTS_MARKER: &str = "no-inputs";

/// Placeholder `input_hash` recorded on the `running` row when the
/// caller cannot cheaply compute the real one up front (aggregation
/// jobs must read their input set — itself I/O — to know it); replaced
/// by the real hash once `attempt` returns it.
const PENDING_MARKER: &str = "pending";

/// Drive a single unit of work to a terminal [`JobOutcome`].
///
/// When `known_input_hash` is `Some` (extraction: derivable from the
/// manifest alone, no I/O needed), a pre-existing `succeeded` row for
/// the same hash short-circuits the whole dispatch (§3 Relationships
/// and invariants). When `None` (aggregation: the input set itself must
/// be read to hash it), that check is skipped and idempotency instead
/// comes from the worker's own content-cache lookup; `attempt` still
/// returns the real hash once it has read the inputs, and that is what
/// gets recorded on success.
pub async fn drive<F, Fut>(
    persistence: &Persistence,
    kind: JobKind,
    natural_key: &str,
    known_input_hash: Option<&str>,
    replay_budget: u32,
    dependency_missing_is_success: bool,
    mut attempt: F,
) -> Result<JobOutcome>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<String, WorkerError>>,
{
    if let Some(hash) = known_input_hash {
        if already_succeeded(persistence, kind, natural_key, hash).await? {
            return Ok(JobOutcome::SkippedAlreadySucceeded);
        }
    }

    let running_marker = known_input_hash.unwrap_or(PENDING_MARKER);
    let mut tries = 0u32;
    loop {
        mark_running(persistence, kind, natural_key, running_marker).await?;
        match attempt().await {
            Ok(result_hash) => {
                mark_succeeded(persistence, kind, natural_key, &result_hash, Some(natural_key)).await?;
                return Ok(JobOutcome::Succeeded);
            }
            Err(WorkerError::DependencyMissing) if dependency_missing_is_success => {
                mark_succeeded(persistence, kind, natural_key, NO_INPUTS_MARKER, None).await?;
                return Ok(JobOutcome::SkippedNoInputs);
            }
            Err(err) => {
                let (message, retryable) = classify(&err);
                if retryable && tries < replay_budget {
                    tries += 1;
                    tracing::warn!(%natural_key, attempt = tries, error = %message, "job attempt failed, replaying");
                    continue;
                }
                mark_dead_lettered(persistence, kind, natural_key, running_marker, &message).await?;
                return Ok(JobOutcome::DeadLettered { message });
            }
        }
    }
}

/// Convert a join-handle panic into a [`CoordinatorError`] for the tier
/// loops, which treat a panicked task the same as any other fatal
/// dispatch failure.
pub fn task_panic(natural_key: &str, join_err: tokio::task::JoinError) -> CoordinatorError {
    CoordinatorError::invalid_transition(format!("job for {natural_key} panicked: {join_err}"))
}
