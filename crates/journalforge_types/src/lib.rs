//! Canonical domain types for the journalforge aggregation pipeline.
//!
//! These types cross every boundary in the system (LLM gateway output,
//! persistence rows, cache payloads) and are intentionally free of I/O.

pub mod extraction;
pub mod hash;
pub mod job_status;
pub mod manifest;
pub mod monthly;
pub mod pipeline_state;
pub mod quarterly;
pub mod range;
pub mod synthesis;
pub mod weekly;

pub use extraction::Extraction;
pub use job_status::{JobKind, JobStatus, JobStatusRecord};
pub use manifest::{Manifest, ManifestEntry};
pub use monthly::MonthlySummary;
pub use pipeline_state::{Phase, PipelineState, Tier};
pub use quarterly::QuarterlyNotepad;
pub use range::{MonthKey, QuarterKey, WeekStart};
pub use synthesis::Synthesis;
pub use weekly::WeeklySummary;

/// Error returned when a structured artifact fails validation against its
/// declared shape (field ranges, array caps, required presence).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("field '{field}' out of range: {value} not in [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("field '{field}' has {len} entries, exceeding cap of {cap}")]
    ArrayTooLong {
        field: &'static str,
        len: usize,
        cap: usize,
    },

    #[error("required field '{field}' missing")]
    MissingField { field: &'static str },
}
