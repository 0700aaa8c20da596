//! LLM Gateway (C1): the single chokepoint for model calls.
//!
//! One operation — `call(messages, options) -> text` — built on
//! `reqwest::Client` against an OpenAI-compatible `/chat/completions`
//! endpoint. Retry/backoff lives inside the gateway itself.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{GatewayError, Result};
use crate::rate_limit::{RateBucket, RateBucketConfig};

/// A zero-data-retention assertion header, present on every request
/// regardless of provider (§4.1 step 1, §6).
const ZDR_HEADER: &str = "X-Zero-Data-Retention";

const BACKOFF_BASE: Duration = Duration::from_secs(2);
const BACKOFF_CAP: Duration = Duration::from_secs(60);

/// One role/content pair in a chat-completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Per-call options (§4.1).
#[derive(Debug, Clone)]
pub struct CallOptions {
    pub temperature: f32,
    pub json_mode: bool,
    pub timeout: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            json_mode: true,
            timeout: Duration::from_secs(55),
        }
    }
}

/// The gateway's single operation, behind a trait so extractor/aggregator
/// workers can be tested against a fake provider (§8: wiremock stands in
/// for the real HTTP surface in gateway tests; a hand-rolled fake stands in
/// for worker tests).
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn call(&self, messages: &[ChatMessage], opts: &CallOptions) -> Result<String>;
}

/// Static configuration for the HTTP-backed gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// General retry ceiling for transient/5xx/timeout failures (§4.1: default 3).
    pub max_retries: u32,
    pub rate: RateBucketConfig,
}

impl GatewayConfig {
    pub fn from_env() -> std::result::Result<Self, String> {
        Ok(Self {
            base_url: std::env::var("JOURNALFORGE_LLM_BASE_URL")
                .map_err(|_| "JOURNALFORGE_LLM_BASE_URL not set".to_string())?,
            api_key: std::env::var("JOURNALFORGE_LLM_API_KEY")
                .map_err(|_| "JOURNALFORGE_LLM_API_KEY not set".to_string())?,
            model: std::env::var("JOURNALFORGE_LLM_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            max_retries: 3,
            rate: RateBucketConfig::default(),
        })
    }
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Outcome of a single HTTP attempt, before the retry loop decides what to
/// do with it.
enum Attempt {
    Success(String),
    RateLimited,
    Transient(String),
    Permanent { status: u16, body: String },
    Timeout,
    Malformed(String),
}

/// HTTP-backed implementation of [`LlmGateway`] against an
/// OpenAI-compatible `/chat/completions` endpoint.
pub struct HttpLlmGateway {
    client: reqwest::Client,
    config: GatewayConfig,
    bucket: RateBucket,
}

impl HttpLlmGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let bucket = RateBucket::new(config.rate);
        Self {
            client: reqwest::Client::new(),
            config,
            bucket,
        }
    }

    async fn send_once(&self, messages: &[ChatMessage], opts: &CallOptions) -> Attempt {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: opts.temperature,
            response_format: opts.json_mode.then_some(ResponseFormat { kind: "json_object" }),
        };

        let request = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url.trim_end_matches('/')))
            .bearer_auth(&self.config.api_key)
            .header(ZDR_HEADER, "true")
            .json(&body);

        let response = match tokio::time::timeout(opts.timeout, request.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(source)) => return Attempt::Transient(source.to_string()),
            Err(_) => return Attempt::Timeout,
        };

        let status = response.status();
        if status.as_u16() == 429 {
            return Attempt::RateLimited;
        }
        if status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            return Attempt::Transient(format!("status {status}: {body}"));
        }
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Attempt::Permanent {
                status: status.as_u16(),
                body,
            };
        }

        match response.json::<ChatResponse>().await {
            Ok(parsed) => match parsed.choices.into_iter().next() {
                Some(choice) => Attempt::Success(choice.message.content),
                None => Attempt::Malformed("response carried zero choices".to_string()),
            },
            Err(source) => Attempt::Malformed(format!("failed to decode response body: {source}")),
        }
    }
}

fn backoff_for(attempt: u32) -> Duration {
    let scaled = BACKOFF_BASE.saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX));
    scaled.min(BACKOFF_CAP)
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn call(&self, messages: &[ChatMessage], opts: &CallOptions) -> Result<String> {
        self.bucket.acquire().await?;

        let mut general_attempt = 0u32;
        let mut rate_limit_attempt = 0u32;

        loop {
            match self.send_once(messages, opts).await {
                Attempt::Success(text) => return Ok(text),
                Attempt::Permanent { status, body } => {
                    return Err(GatewayError::Permanent { status, body })
                }
                Attempt::Malformed(msg) => return Err(GatewayError::MalformedResponse(msg)),
                Attempt::RateLimited => {
                    rate_limit_attempt += 1;
                    // The first two 429s per call are free (§4.1 step 2);
                    // beyond that they draw from the general retry budget.
                    if rate_limit_attempt > 2 {
                        general_attempt += 1;
                        if general_attempt > self.config.max_retries {
                            return Err(GatewayError::RateLimited);
                        }
                    }
                    let delay = backoff_for(rate_limit_attempt.saturating_sub(1));
                    warn!(attempt = rate_limit_attempt, ?delay, "provider rate-limited, backing off");
                    tokio::time::sleep(delay).await;
                }
                Attempt::Transient(msg) => {
                    general_attempt += 1;
                    if general_attempt > self.config.max_retries {
                        return Err(GatewayError::Transient(msg));
                    }
                    let delay = backoff_for(general_attempt - 1);
                    warn!(attempt = general_attempt, %msg, ?delay, "transient provider failure, retrying");
                    tokio::time::sleep(delay).await;
                }
                Attempt::Timeout => {
                    general_attempt += 1;
                    if general_attempt > self.config.max_retries {
                        return Err(GatewayError::Timeout);
                    }
                    let delay = backoff_for(general_attempt - 1);
                    warn!(attempt = general_attempt, ?delay, "provider request timed out, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
