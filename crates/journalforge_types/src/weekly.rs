//! Weekly Summary: tier-1 aggregate over one 7-day window.

use serde::{Deserialize, Serialize};

use crate::range::WeekStart;
use crate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    Volatile,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonSeenAggregate {
    pub name: String,
    pub count: u32,
    pub mean_sentiment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub week_start: WeekStart,
    pub mean_mood: f64,
    pub mean_energy: f64,
    pub trend: Trend,
    pub people_seen: Vec<PersonSeenAggregate>,
    pub dominant_themes: Vec<String>,
    pub notable_events: Vec<String>,
    pub cycle_pattern_note: Option<String>,
    pub narrative: String,
}

impl WeeklySummary {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.narrative.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "narrative" });
        }
        if self.dominant_themes.len() > 5 {
            return Err(ValidationError::ArrayTooLong {
                field: "dominant_themes",
                len: self.dominant_themes.len(),
                cap: 5,
            });
        }
        Ok(())
    }

    pub fn natural_key(&self) -> String {
        self.week_start.as_key()
    }
}
