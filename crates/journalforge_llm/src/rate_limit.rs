//! The rate bucket: the one genuinely process-wide contended resource
//! (§5). A small hand-rolled token bucket guarded by a `tokio::sync::Mutex`,
//! chosen over an external crate since this is a purely in-process,
//! single-binary concern.

use std::time::{Duration, Instant};

use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::error::{GatewayError, Result};

/// Rate-bucket configuration, set once at process start (§4.1).
#[derive(Debug, Clone, Copy)]
pub struct RateBucketConfig {
    /// Conservative default per §4.1: 50 requests/minute.
    pub requests_per_minute: u32,
    /// Additional daily ceiling; `None` disables the daily check.
    pub daily_ceiling: Option<u64>,
}

impl Default for RateBucketConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: 50,
            daily_ceiling: Some(5_000),
        }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
    day: Option<NaiveDate>,
    used_today: u64,
}

/// Fair token bucket with blocking acquire. Callers await [`RateBucket::acquire`]
/// before every provider call; the bucket refills continuously at
/// `requests_per_minute / 60` tokens per second.
pub struct RateBucket {
    config: RateBucketConfig,
    state: Mutex<BucketState>,
}

impl RateBucket {
    pub fn new(config: RateBucketConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BucketState {
                tokens: config.requests_per_minute as f64,
                last_refill: Instant::now(),
                day: None,
                used_today: 0,
            }),
        }
    }

    /// Block until one token is available, consuming it. Returns
    /// [`GatewayError::DailyCeilingExhausted`] immediately rather than
    /// blocking forever once the daily ceiling for the current UTC day has
    /// been reached.
    pub async fn acquire(&self) -> Result<()> {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                self.refill(&mut state);

                let today = Utc::now().date_naive();
                if state.day != Some(today) {
                    state.day = Some(today);
                    state.used_today = 0;
                }
                if let Some(ceiling) = self.config.daily_ceiling {
                    if state.used_today >= ceiling {
                        return Err(GatewayError::DailyCeilingExhausted);
                    }
                }

                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    state.used_today += 1;
                    None
                } else {
                    let deficit = 1.0 - state.tokens;
                    let per_second = self.config.requests_per_minute as f64 / 60.0;
                    Some(Duration::from_secs_f64(deficit / per_second))
                }
            };

            match wait {
                None => return Ok(()),
                Some(duration) => sleep(duration.max(Duration::from_millis(10))).await,
            }
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let per_second = self.config.requests_per_minute as f64 / 60.0;
        let cap = self.config.requests_per_minute as f64;
        state.tokens = (state.tokens + elapsed * per_second).min(cap);
        state.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_never_exceeds_configured_ceiling() {
        let bucket = RateBucket::new(RateBucketConfig {
            requests_per_minute: 2,
            daily_ceiling: None,
        });
        // Two tokens are available immediately; the third must wait.
        bucket.acquire().await.unwrap();
        bucket.acquire().await.unwrap();

        let start = Instant::now();
        bucket.acquire().await.unwrap();
        assert!(start.elapsed() > Duration::from_millis(1));
    }

    #[tokio::test]
    async fn daily_ceiling_rejects_once_exhausted() {
        let bucket = RateBucket::new(RateBucketConfig {
            requests_per_minute: 1000,
            daily_ceiling: Some(2),
        });
        bucket.acquire().await.unwrap();
        bucket.acquire().await.unwrap();
        let result = bucket.acquire().await;
        assert!(matches!(result, Err(GatewayError::DailyCeilingExhausted)));
    }
}
