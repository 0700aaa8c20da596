//! Content-hashing helpers shared by the cache, persistence, and worker
//! layers. Ported from the separator-joined blake3 hashing scheme the
//! protocol layer uses for idempotency keys, generalized to arbitrary
//! input sets.

use blake3::Hasher;

const SEP: u8 = 0x1f;

fn hash_parts<I, S>(parts: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut hasher = Hasher::new();
    for part in parts {
        hasher.update(part.as_ref().as_bytes());
        hasher.update(&[SEP]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Stable content hash for one entry's preprocessed bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Truncate a hex hash to its leading `n` characters for use in short
/// cache keys (e.g. `extract:{date}:{hash[0..16]}`).
pub fn short_hash(hash: &str, n: usize) -> &str {
    &hash[..hash.len().min(n)]
}

/// Deterministic `input_hash` for an aggregation: the ordered natural
/// keys and body hashes of every input consumed, plus the prompt-version
/// tag. Changing the prompt library's `PROMPT_VERSION` implicitly
/// invalidates every downstream cache entry without manual eviction.
pub fn input_hash<'a>(inputs: impl IntoIterator<Item = (&'a str, &'a str)>, prompt_version: u32) -> String {
    let mut parts: Vec<String> = inputs
        .into_iter()
        .map(|(key, body_hash)| format!("{key}:{body_hash}"))
        .collect();
    parts.sort();
    parts.push(format!("prompt_version:{prompt_version}"));
    hash_parts(parts)
}

/// Cache key for one extraction job.
pub fn extraction_cache_key(entry_date: &str, content_hash: &str) -> String {
    format!("extract:{entry_date}:{}", short_hash(content_hash, 16))
}

/// Cache key for one aggregation job at a given tier and range.
pub fn aggregation_cache_key(tier: &str, range_id: &str, input_hash: &str) -> String {
    format!("agg:{tier}:{range_id}:{}", short_hash(input_hash, 16))
}
