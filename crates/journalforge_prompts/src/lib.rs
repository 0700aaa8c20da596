//! Prompt Library (C8): pure functions mapping (tier, inputs) to prompt
//! text and the output shape the LLM Gateway's caller validates against.
//!
//! Every function here is deterministic and does no I/O. Bumping
//! `PROMPT_VERSION` is the one lever that invalidates every cached and
//! persisted `input_hash` downstream (`journalforge_types::hash::input_hash`
//! folds this constant into the digest), so a prompt or output-shape change
//! must bump it.

use journalforge_types::extraction::Extraction;
use journalforge_types::monthly::MonthlySummary;
use journalforge_types::quarterly::QuarterlyNotepad;
use journalforge_types::range::{MonthKey, QuarterKey, WeekStart};
use journalforge_types::weekly::WeeklySummary;

/// Bump on any change to a prompt's wording or a tier's expected JSON shape.
pub const PROMPT_VERSION: u32 = 1;

/// Shared system prompt: JSON-mode discipline, no fabrication, field caps.
pub fn system_prompt() -> &'static str {
    "You are a careful, literal journal analyst. Respond with a single JSON \
     object matching the requested shape exactly — no markdown fences, no \
     commentary before or after the object. Never invent people, dates, \
     medications, or events that are not present in the supplied text. If a \
     field does not apply, use null rather than a placeholder value. Keep \
     numeric fields within their stated range and respect every array size \
     cap; truncate to the most salient items rather than omitting the field."
}

const EXTRACTION_SHAPE: &str = r#"{
  "mood_score": integer 1-10,
  "energy_level": integer 1-10,
  "sleep_mentioned": boolean,
  "sleep_quality": integer 1-10 or null (null unless sleep_mentioned is true),
  "medication_mentioned": boolean,
  "hormone_therapy_mentioned": boolean,
  "people_mentions": [{"name": string, "relationship": "family"|"friend"|"partner"|"colleague"|"therapist"|"other", "sentiment": integer 1-10, "interaction_mode": "in_person"|"call"|"text"|"video"|"other"}],
  "activities": [string],
  "events": [string],
  "dominant_themes": [string] (at most 5),
  "identity_markers": [string],
  "key_quotes": [string] (at most 3, verbatim from the entry),
  "summary": string (2-3 sentences)
}"#;

/// `extractionPrompt(date, content)` (§4.5 step 3).
pub fn extraction_prompt(entry_date: &str, content: &str) -> String {
    format!(
        "Journal entry dated {entry_date}:\n\n\"\"\"\n{content}\n\"\"\"\n\n\
         Extract a structured record with exactly this shape:\n{EXTRACTION_SHAPE}"
    )
}

const WEEKLY_SHAPE: &str = r#"{
  "mean_mood": number,
  "mean_energy": number,
  "trend": "improving"|"declining"|"stable"|"volatile",
  "people_seen": [{"name": string, "count": integer, "mean_sentiment": number}],
  "dominant_themes": [string] (at most 5),
  "notable_events": [string],
  "cycle_pattern_note": string or null,
  "narrative": string (one paragraph)
}"#;

/// `weeklyPrompt(week_start, extractions)` over the 7 extractions in window.
pub fn weekly_prompt(week_start: WeekStart, extractions: &[Extraction]) -> String {
    let body = summarize_extractions(extractions);
    format!(
        "Week starting {week_start} ({} daily extractions below):\n\n{body}\n\n\
         Summarize this week with exactly this shape:\n{WEEKLY_SHAPE}",
        extractions.len()
    )
}

const MONTHLY_SHAPE: &str = r#"{
  "happiness_index": number,
  "trajectory": "up"|"down"|"flat"|"mixed",
  "relationship_health": {category: number, ...},
  "top_themes": [string] (at most 5),
  "milestones": [string],
  "challenges": [string],
  "wins": [string],
  "medication_notes": string or null,
  "sleep_pattern_summary": string or null,
  "narrative": string (2-3 paragraphs)
}"#;

/// `monthlyPrompt(month, weeklies)` over the weekly summaries for the month.
pub fn monthly_prompt(month: MonthKey, weeklies: &[WeeklySummary]) -> String {
    let body = summarize_weeklies(weeklies);
    format!(
        "Month {month} ({} weekly summaries below):\n\n{body}\n\n\
         Summarize this month with exactly this shape:\n{MONTHLY_SHAPE}",
        weeklies.len()
    )
}

const QUARTERLY_SHAPE: &str = r#"{
  "trajectory": [{"month": "YYYY-MM", "happiness_index": number}],
  "chapter_title": string,
  "opening_state": string,
  "closing_state": string,
  "most_mentioned_people": [{"name": string, "mention_count": integer, "trajectory_note": string}],
  "narrative": string (4-6 paragraphs)
}"#;

/// `quarterlyPrompt(quarter, monthlies)` over the quarter's 3 monthly summaries.
pub fn quarterly_prompt(quarter: QuarterKey, monthlies: &[MonthlySummary]) -> String {
    let body = summarize_monthlies(monthlies);
    format!(
        "Quarter {quarter} ({} monthly summaries below):\n\n{body}\n\n\
         Write the quarterly notepad with exactly this shape:\n{QUARTERLY_SHAPE}",
        monthlies.len()
    )
}

const SYNTHESIS_SHAPE: &str = r#"{
  "thesis": string (one sentence),
  "pre_milestone_narrative": string,
  "post_milestone_narrative": string,
  "quarter_metrics": [{"quarter": "YYYY-QN", "happiness_index": number, "mean_mood": number}],
  "weekly_patterns": [{"description": string, "supporting_weeks": ["YYYY-MM-DD", ...]}],
  "seasonal_patterns": [{"season": string, "description": string}],
  "medication_correlations": [{"period_label": string, "medication": string, "note": string}] (omit periods with no observed mentions; do not fabricate a null placeholder entry),
  "relationship_arcs": [{"name": string, "arc_description": string}],
  "milestones": [{"date_label": string, "description": string}],
  "strengths": [string],
  "challenges": [string],
  "growth": [string],
  "executive_summary": string,
  "narrative": string (full two-year narrative)
}"#;

/// `synthesisPrompt(notepads)` over all eight quarterly notepads of the span.
pub fn synthesis_prompt(notepads: &[QuarterlyNotepad]) -> String {
    let body = summarize_notepads(notepads);
    format!(
        "Two-year span ({} quarterly notepads below):\n\n{body}\n\n\
         Write the full synthesis with exactly this shape:\n{SYNTHESIS_SHAPE}",
        notepads.len()
    )
}

fn summarize_extractions(extractions: &[Extraction]) -> String {
    extractions
        .iter()
        .map(|e| {
            format!(
                "- {}: mood={} energy={} summary=\"{}\"",
                e.entry_date, e.mood_score, e.energy_level, e.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_weeklies(weeklies: &[WeeklySummary]) -> String {
    weeklies
        .iter()
        .map(|w| {
            format!(
                "- week {}: trend={:?} mean_mood={:.1} narrative=\"{}\"",
                w.week_start, w.trend, w.mean_mood, w.narrative
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_monthlies(monthlies: &[MonthlySummary]) -> String {
    monthlies
        .iter()
        .map(|m| {
            format!(
                "- month {}: trajectory={:?} happiness_index={:.1} narrative=\"{}\"",
                m.month, m.trajectory, m.happiness_index, m.narrative
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn summarize_notepads(notepads: &[QuarterlyNotepad]) -> String {
    notepads
        .iter()
        .map(|q| {
            format!(
                "- quarter {}: \"{}\" narrative=\"{}\"",
                q.quarter, q.chapter_title, q.narrative
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
