//! Token bucket rate limiter.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

/// In-memory token bucket rate limiter keyed by an arbitrary string.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    buckets: Arc<DashMap<String, TokenBucket>>,
    max_tokens: u32,
    refill_rate: f64,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// Creates a new rate limiter.
    pub fn new(max_tokens: u32, refill_rate: f64) -> Self {
        Self {
            buckets: Arc::new(DashMap::new()),
            max_tokens: max_tokens.max(1),
            refill_rate: refill_rate.max(0.0),
        }
    }

    /// Attempts to consume a token for the given key.
    pub fn check(&self, key: &str) -> bool {
        self.check_at(key, Instant::now())
    }

    /// [`check`](Self::check) at an explicit instant.
    pub fn check_at(&self, key: &str, now: Instant) -> bool {
        let capacity = f64::from(self.max_tokens);
        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert(TokenBucket {
                tokens: capacity,
                last_refill: now,
            });

        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.refill_rate).min(capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Number of tracked keys.
    pub fn tracked_keys(&self) -> usize {
        self.buckets.len()
    }
}
