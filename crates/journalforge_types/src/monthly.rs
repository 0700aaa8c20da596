//! Monthly Summary: tier-2 aggregate over one calendar month.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::range::MonthKey;
use crate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trajectory {
    Up,
    Down,
    Flat,
    Mixed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlySummary {
    pub month: MonthKey,
    pub happiness_index: f64,
    pub trajectory: Trajectory,
    /// Per-relationship-category health score, e.g. "family" -> 7.2.
    pub relationship_health: HashMap<String, f64>,
    pub top_themes: Vec<String>,
    pub milestones: Vec<String>,
    pub challenges: Vec<String>,
    pub wins: Vec<String>,
    pub medication_notes: Option<String>,
    pub sleep_pattern_summary: Option<String>,
    pub narrative: String,
}

impl MonthlySummary {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.narrative.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "narrative" });
        }
        if self.top_themes.len() > 5 {
            return Err(ValidationError::ArrayTooLong {
                field: "top_themes",
                len: self.top_themes.len(),
                cap: 5,
            });
        }
        Ok(())
    }

    pub fn natural_key(&self) -> String {
        self.month.as_key()
    }
}
