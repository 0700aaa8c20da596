//! Pipeline State: the Coordinator's own durable singleton row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four aggregation tiers, in dependency order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Weekly,
    Monthly,
    Quarterly,
    Synthesis,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Weekly, Tier::Monthly, Tier::Quarterly, Tier::Synthesis];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Weekly => "weekly",
            Tier::Monthly => "monthly",
            Tier::Quarterly => "quarterly",
            Tier::Synthesis => "synthesis",
        }
    }

    /// The tier that directly follows this one, or `None` after synthesis.
    pub fn next(&self) -> Option<Tier> {
        match self {
            Tier::Weekly => Some(Tier::Monthly),
            Tier::Monthly => Some(Tier::Quarterly),
            Tier::Quarterly => Some(Tier::Synthesis),
            Tier::Synthesis => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "weekly" => Ok(Tier::Weekly),
            "monthly" => Ok(Tier::Monthly),
            "quarterly" => Ok(Tier::Quarterly),
            "synthesis" => Ok(Tier::Synthesis),
            other => Err(format!("invalid tier: {other}")),
        }
    }
}

/// Coordinator phase (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "phase")]
pub enum Phase {
    #[default]
    Idle,
    Extracting,
    Aggregating {
        #[serde(rename = "currentTier")]
        current_tier: Tier,
    },
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Extracting => "extracting",
            Phase::Aggregating { .. } => "aggregating",
            Phase::Complete => "complete",
        }
    }

    pub fn current_tier(&self) -> Option<Tier> {
        match self {
            Phase::Aggregating { current_tier } => Some(*current_tier),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.current_tier() {
            Some(tier) => write!(f, "{}({})", self.as_str(), tier),
            None => write!(f, "{}", self.as_str()),
        }
    }
}

/// The Coordinator's singleton durable state row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    pub phase: Phase,
    pub total_entries: u32,
    pub processed_entries: u32,
    /// The Monday-aligned weekday fixed for this run's week grid,
    /// resolved once at `start` from the manifest's first date so a
    /// crash-restart does not recompute (and potentially shift) it.
    pub week_grid_anchor: Option<chrono::NaiveDate>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub warnings: Vec<String>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            total_entries: 0,
            processed_entries: 0,
            week_grid_anchor: None,
            started_at: None,
            completed_at: None,
            warnings: Vec::new(),
        }
    }
}

impl PipelineState {
    pub fn is_idle(&self) -> bool {
        matches!(self.phase, Phase::Idle)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.phase, Phase::Complete)
    }
}
