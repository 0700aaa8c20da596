//! Synthesis: the singleton tier-4 artifact over the full two-year span.

use serde::{Deserialize, Serialize};

use crate::ValidationError;

pub const SYNTHESIS_KEY: &str = "main";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuarterMetric {
    pub quarter: String,
    pub happiness_index: f64,
    pub mean_mood: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPatternBlock {
    pub description: String,
    pub supporting_weeks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonalPatternBlock {
    pub season: String,
    pub description: String,
}

/// One period's medication/hormone-therapy correlation note.
///
/// Open question (§9) resolved in DESIGN.md: a period with no mentions in
/// the underlying extractions is *omitted* from this array entirely,
/// rather than emitted with a null or placeholder `note` — the synthesis
/// prompt is instructed not to fabricate commentary on data that was never
/// observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MedicationCorrelationBlock {
    pub period_label: String,
    pub medication: String,
    pub note: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipArc {
    pub name: String,
    pub arc_description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEntry {
    pub date_label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Synthesis {
    pub thesis: String,
    pub pre_milestone_narrative: String,
    pub post_milestone_narrative: String,
    pub quarter_metrics: Vec<QuarterMetric>,
    pub weekly_patterns: Vec<WeeklyPatternBlock>,
    pub seasonal_patterns: Vec<SeasonalPatternBlock>,
    pub medication_correlations: Vec<MedicationCorrelationBlock>,
    pub relationship_arcs: Vec<RelationshipArc>,
    pub milestones: Vec<MilestoneEntry>,
    pub strengths: Vec<String>,
    pub challenges: Vec<String>,
    pub growth: Vec<String>,
    pub executive_summary: String,
    pub narrative: String,
}

impl Synthesis {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.thesis.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "thesis" });
        }
        if self.narrative.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "narrative" });
        }
        if self.executive_summary.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "executive_summary",
            });
        }
        Ok(())
    }

    pub fn natural_key(&self) -> &'static str {
        SYNTHESIS_KEY
    }
}
