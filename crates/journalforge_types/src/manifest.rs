//! Manifest schema (§6): the durable, ordered index of entries the
//! preprocessing stage hands to the pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One row of the manifest: identifies one raw journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub date: NaiveDate,
    #[serde(rename = "originalPath")]
    pub original_path: String,
    #[serde(rename = "r2Key")]
    pub r2_key: String,
    #[serde(rename = "wordCount")]
    pub word_count: u32,
    #[serde(rename = "contentHash")]
    pub content_hash: String,
}

/// The inclusive date range spanned by the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// The full manifest produced by the (out-of-scope) preprocessing stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "generatedAt")]
    pub generated_at: DateTime<Utc>,
    #[serde(rename = "totalEntries")]
    pub total_entries: u32,
    #[serde(rename = "dateRange")]
    pub date_range: DateRange,
    pub entries: Vec<ManifestEntry>,
}

/// Error returned by [`Manifest::validate`].
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ManifestError {
    #[error("totalEntries ({declared}) does not match entries.len() ({actual})")]
    CountMismatch { declared: u32, actual: usize },

    #[error("entries are not in ascending date order at index {index}")]
    OutOfOrder { index: usize },

    #[error("duplicate date {date} at index {index}")]
    DuplicateDate { date: NaiveDate, index: usize },

    #[error("manifest has no entries")]
    Empty,
}

impl Manifest {
    /// Validate the manifest's structural invariants (§6: entries MUST
    /// appear in ascending date order; dates MUST be unique).
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.entries.is_empty() {
            return Err(ManifestError::Empty);
        }
        if self.entries.len() != self.total_entries as usize {
            return Err(ManifestError::CountMismatch {
                declared: self.total_entries,
                actual: self.entries.len(),
            });
        }
        for (i, pair) in self.entries.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.date < prev.date {
                return Err(ManifestError::OutOfOrder { index: i + 1 });
            }
            if next.date == prev.date {
                return Err(ManifestError::DuplicateDate {
                    date: next.date,
                    index: i + 1,
                });
            }
        }
        Ok(())
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.entries.first().map(|e| e.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.entries.last().map(|e| e.date)
    }
}
