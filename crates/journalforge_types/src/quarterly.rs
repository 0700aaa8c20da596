//! Quarterly Notepad: tier-3 aggregate over three consecutive months.

use serde::{Deserialize, Serialize};

use crate::range::QuarterKey;
use crate::ValidationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyTrajectoryPoint {
    pub month: String,
    pub happiness_index: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonTrajectory {
    pub name: String,
    pub mention_count: u32,
    pub trajectory_note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterlyNotepad {
    pub quarter: QuarterKey,
    pub trajectory: Vec<MonthlyTrajectoryPoint>,
    pub chapter_title: String,
    pub opening_state: String,
    pub closing_state: String,
    pub most_mentioned_people: Vec<PersonTrajectory>,
    pub narrative: String,
}

impl QuarterlyNotepad {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.narrative.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "narrative" });
        }
        if self.chapter_title.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "chapter_title" });
        }
        Ok(())
    }

    pub fn natural_key(&self) -> String {
        self.quarter.as_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_key_is_quarter_string() {
        let q = QuarterlyNotepad {
            quarter: QuarterKey { year: 2025, quarter: 1 },
            trajectory: vec![],
            chapter_title: "Finding footing".into(),
            opening_state: "uncertain".into(),
            closing_state: "settled".into(),
            most_mentioned_people: vec![],
            narrative: "Three months of change.".into(),
        };
        assert_eq!(q.natural_key(), "2025-Q1");
    }
}
