//! The tier-0 Extraction artifact, one per journal entry.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_THEMES: usize = 5;
const MAX_QUOTES: usize = 3;
const SCORE_MIN: i64 = 1;
const SCORE_MAX: i64 = 10;

/// Relationship kind for a people mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    Family,
    Friend,
    Partner,
    Colleague,
    Therapist,
    Other,
}

/// Sentiment of one people mention, on the same 1-10 scale as mood/energy.
pub type Sentiment = i64;

/// Interaction mode for a people mention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionMode {
    InPerson,
    Call,
    Text,
    Video,
    Other,
}

/// One tuple in the Extraction's people-mentions array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonMention {
    pub name: String,
    pub relationship: RelationshipKind,
    pub sentiment: Sentiment,
    pub interaction_mode: InteractionMode,
}

/// Sleep quality, present only when `sleep_mentioned` is true.
pub type SleepQuality = i64;

/// The dense per-entry structured record extracted by the LLM gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub entry_date: NaiveDate,
    pub mood_score: i64,
    pub energy_level: i64,
    pub sleep_mentioned: bool,
    pub sleep_quality: Option<SleepQuality>,
    pub medication_mentioned: bool,
    pub hormone_therapy_mentioned: bool,
    pub people_mentions: Vec<PersonMention>,
    pub activities: Vec<String>,
    pub events: Vec<String>,
    pub dominant_themes: Vec<String>,
    pub identity_markers: Vec<String>,
    pub key_quotes: Vec<String>,
    pub summary: String,
}

impl Extraction {
    /// Enforce §4.5 step 5 validation: numeric ranges, nullable typing,
    /// and array size caps.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("mood_score", self.mood_score)?;
        check_range("energy_level", self.energy_level)?;

        if let Some(quality) = self.sleep_quality {
            check_range("sleep_quality", quality)?;
        }
        if !self.sleep_mentioned && self.sleep_quality.is_some() {
            return Err(ValidationError::MissingField {
                field: "sleep_quality must be null when sleep_mentioned is false",
            });
        }

        for mention in &self.people_mentions {
            check_range("people_mentions[].sentiment", mention.sentiment)?;
        }

        if self.dominant_themes.len() > MAX_THEMES {
            return Err(ValidationError::ArrayTooLong {
                field: "dominant_themes",
                len: self.dominant_themes.len(),
                cap: MAX_THEMES,
            });
        }
        if self.key_quotes.len() > MAX_QUOTES {
            return Err(ValidationError::ArrayTooLong {
                field: "key_quotes",
                len: self.key_quotes.len(),
                cap: MAX_QUOTES,
            });
        }
        if self.summary.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "summary" });
        }

        Ok(())
    }
}

fn check_range(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value < SCORE_MIN || value > SCORE_MAX {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min: SCORE_MIN,
            max: SCORE_MAX,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Extraction {
        Extraction {
            entry_date: "2025-03-03".parse().unwrap(),
            mood_score: 7,
            energy_level: 6,
            sleep_mentioned: true,
            sleep_quality: Some(5),
            medication_mentioned: false,
            hormone_therapy_mentioned: false,
            people_mentions: vec![PersonMention {
                name: "Alex".into(),
                relationship: RelationshipKind::Friend,
                sentiment: 8,
                interaction_mode: InteractionMode::InPerson,
            }],
            activities: vec!["running".into()],
            events: vec![],
            dominant_themes: vec!["growth".into()],
            identity_markers: vec![],
            key_quotes: vec!["today was good".into()],
            summary: "A good day overall.".into(),
        }
    }

    #[test]
    fn valid_extraction_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn mood_score_out_of_range_rejected() {
        let mut e = valid();
        e.mood_score = 11;
        assert!(matches!(
            e.validate(),
            Err(ValidationError::OutOfRange { field: "mood_score", .. })
        ));
    }

    #[test]
    fn too_many_themes_rejected() {
        let mut e = valid();
        e.dominant_themes = (0..6).map(|i| format!("theme{i}")).collect();
        assert!(matches!(
            e.validate(),
            Err(ValidationError::ArrayTooLong { field: "dominant_themes", len: 6, cap: 5 })
        ));
    }

    #[test]
    fn too_many_quotes_rejected() {
        let mut e = valid();
        e.key_quotes = (0..4).map(|i| format!("quote{i}")).collect();
        assert!(matches!(
            e.validate(),
            Err(ValidationError::ArrayTooLong { field: "key_quotes", .. })
        ));
    }

    #[test]
    fn sleep_quality_without_sleep_mentioned_rejected() {
        let mut e = valid();
        e.sleep_mentioned = false;
        assert!(e.validate().is_err());
    }

    #[test]
    fn empty_summary_rejected() {
        let mut e = valid();
        e.summary = "   ".into();
        assert!(e.validate().is_err());
    }
}
