//! Shared parse-then-validate glue for every tier's artifact, and the
//! single-retry call pattern of §4.5 step 5 / §4.6 step 5: parse and
//! validate the gateway's JSON text against the artifact's declared
//! schema, retry once on failure with the identical prompt, and give up
//! for good on the second miss.

use journalforge_llm::{CallOptions, ChatMessage, LlmGateway};
use journalforge_types::extraction::Extraction;
use journalforge_types::monthly::MonthlySummary;
use journalforge_types::quarterly::QuarterlyNotepad;
use journalforge_types::synthesis::Synthesis;
use journalforge_types::weekly::WeeklySummary;
use journalforge_types::ValidationError;

use crate::error::WorkerError;

/// An artifact that can be deserialized from the gateway's raw JSON text
/// and checked against its own declared shape.
pub trait Validated: serde::de::DeserializeOwned {
    fn check(&self) -> Result<(), ValidationError>;
}

impl Validated for Extraction {
    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

impl Validated for WeeklySummary {
    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

impl Validated for MonthlySummary {
    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

impl Validated for QuarterlyNotepad {
    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

impl Validated for Synthesis {
    fn check(&self) -> Result<(), ValidationError> {
        self.validate()
    }
}

fn parse_and_validate<T: Validated>(text: &str) -> Result<T, String> {
    let value: T = serde_json::from_str(text).map_err(|e| e.to_string())?;
    value.check().map_err(|e| e.to_string())?;
    Ok(value)
}

/// Call the gateway, parse and validate the response against `T`'s
/// shape, and retry once with the same messages on a schema miss.
pub async fn call_and_validate<T: Validated>(
    gateway: &dyn LlmGateway,
    messages: &[ChatMessage],
) -> Result<T, WorkerError> {
    let opts = CallOptions::default();

    let first_text = gateway.call(messages, &opts).await?;
    match parse_and_validate::<T>(&first_text) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            tracing::warn!(error = %first_err, "schema validation failed, retrying once");
            let retry_text = gateway.call(messages, &opts).await?;
            parse_and_validate::<T>(&retry_text).map_err(|_| WorkerError::SchemaValidation(first_err))
        }
    }
}
