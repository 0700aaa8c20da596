//! LLM Gateway (C1): the single chokepoint for model calls — JSON-mode
//! request, exponential backoff, rate pacing, and a trait boundary so
//! callers never touch the HTTP surface directly.

mod error;
mod gateway;
mod rate_limit;

pub use error::{GatewayError, Result};
pub use gateway::{CallOptions, ChatMessage, GatewayConfig, HttpLlmGateway, LlmGateway};
pub use rate_limit::{RateBucket, RateBucketConfig};
