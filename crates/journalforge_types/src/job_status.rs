//! Job Status rows: one per dispatched job, enabling idempotent replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pipeline_state::Tier;

/// The kind of work a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Extraction,
    Aggregation(Tier),
}

impl JobKind {
    pub fn as_db_str(&self) -> String {
        match self {
            JobKind::Extraction => "extraction".to_string(),
            JobKind::Aggregation(tier) => format!("aggregation:{tier}"),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "extraction" {
            return Ok(JobKind::Extraction);
        }
        if let Some(tier_str) = s.strip_prefix("aggregation:") {
            return tier_str
                .parse::<Tier>()
                .map(JobKind::Aggregation)
                .map_err(|e| format!("invalid job kind '{s}': {e}"));
        }
        Err(format!("invalid job kind: {s}"))
    }
}

/// Job status, per §3 and §8 (Monotonicity): transitions follow
/// `pending -> running -> {succeeded, dead-lettered}` and never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    DeadLettered,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::DeadLettered => "dead_lettered",
        }
    }

    /// Terminal statuses never regress (§8 Monotonicity).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::DeadLettered)
    }

    /// A tier is "done" with a range-id once it is `succeeded` or
    /// `dead-lettered` (§4.7 tier-completion detection).
    pub fn counts_as_resolved(&self) -> bool {
        self.is_terminal()
    }

    /// Whether `next` is a legal transition from `self`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match (self, next) {
            (JobStatus::Pending, JobStatus::Running) => true,
            (JobStatus::Pending, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::Succeeded) => true,
            (JobStatus::Running, JobStatus::Failed) => true,
            (JobStatus::Running, JobStatus::DeadLettered) => true,
            (JobStatus::Failed, JobStatus::Running) => true,
            (JobStatus::Failed, JobStatus::DeadLettered) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "succeeded" => Ok(JobStatus::Succeeded),
            "failed" => Ok(JobStatus::Failed),
            "dead_lettered" => Ok(JobStatus::DeadLettered),
            other => Err(format!("invalid job status: {other}")),
        }
    }
}

/// One persisted job-status row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub id: String,
    pub kind: JobKind,
    pub natural_key: String,
    pub input_hash: String,
    pub status: JobStatus,
    pub result_ref: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_kind_round_trips() {
        assert_eq!("extraction".parse::<JobKind>().unwrap(), JobKind::Extraction);
        assert_eq!(
            "aggregation:monthly".parse::<JobKind>().unwrap(),
            JobKind::Aggregation(Tier::Monthly)
        );
        assert_eq!(JobKind::Aggregation(Tier::Monthly).to_string(), "aggregation:monthly");
    }

    #[test]
    fn terminal_statuses_never_regress() {
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::DeadLettered.is_terminal());
        assert!(!JobStatus::Succeeded.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::DeadLettered.can_transition_to(JobStatus::Succeeded));
    }

    #[test]
    fn legal_forward_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Succeeded));
        assert!(JobStatus::Running.can_transition_to(JobStatus::DeadLettered));
    }

    #[test]
    fn illegal_transition_rejected() {
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Succeeded));
    }
}
