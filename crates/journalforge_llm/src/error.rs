//! Gateway error kinds (§7: `TransientNetwork`, `RateLimited`, `PermanentJob`
//! bubble up from here).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GatewayError>;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Network or 5xx failure, retry budget exhausted.
    #[error("transient provider failure: {0}")]
    Transient(String),

    /// HTTP 429, general retry budget exhausted (after the first two
    /// occurrences, which are free per call per §4.1 step 2).
    #[error("rate limited by provider, retry budget exhausted")]
    RateLimited,

    /// The process-wide daily request ceiling has been reached.
    #[error("daily request ceiling reached")]
    DailyCeilingExhausted,

    /// Non-429 4xx: fail permanently, no retry.
    #[error("permanent provider failure (status {status}): {body}")]
    Permanent { status: u16, body: String },

    /// Per-request timeout elapsed, retry budget exhausted.
    #[error("provider request timed out")]
    Timeout,

    /// The response body did not carry the expected chat-completion shape.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}
