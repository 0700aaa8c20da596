//! Helpers shared by the extractor and aggregator.

use serde::Serialize;

use crate::error::WorkerError;

/// Cache TTL for both tiers (§4.2): long enough to outlive a single
/// pipeline run with room to spare, short enough that a stale entry from
/// an abandoned run eventually falls out on its own.
pub const CACHE_TTL_SECONDS: i64 = 7 * 24 * 3600;

/// The body hash folded into an aggregation's `input_hash` for one input
/// artifact. Lower-tier artifacts don't carry their own stored hash
/// field, so this hashes their serialized JSON body directly.
pub fn body_hash<T: Serialize>(value: &T) -> Result<String, WorkerError> {
    Ok(journalforge_types::hash::content_hash(&serde_json::to_vec(
        value,
    )?))
}
