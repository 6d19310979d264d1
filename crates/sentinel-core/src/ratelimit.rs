//! Token-bucket rate limiting per `(client, operation class)`.
//!
//! Generalizes the gas budget's "check-then-consume, unchanged on
//! failure" discipline from a one-shot allowance to a bucket that
//! refills over time.

use std::collections::HashMap;
use std::time::Instant;

use crate::config::RateLimiterConfig;
use crate::error::{Result, SentinelError};

/// Which bucket a request draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationClass {
    Scan,
    PolicyQuery,
}

struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self {
            capacity,
            tokens: capacity,
            refill_per_sec,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
    }

    /// Attempts to draw one token. Balance is unchanged on rejection,
    /// matching the budget's unchanged-on-failure guarantee.
    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Per-client, per-operation-class token buckets plus a concurrent-scan
/// cap.
pub struct RateLimiter {
    config: RateLimiterConfig,
    buckets: HashMap<(String, OperationClass), TokenBucket>,
    concurrent_scans: HashMap<String, usize>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            buckets: HashMap::new(),
            concurrent_scans: HashMap::new(),
        }
    }

    fn bucket_for(&mut self, client: &str, class: OperationClass) -> &mut TokenBucket {
        let (capacity, refill) = match class {
            OperationClass::Scan => (self.config.scan_bucket_capacity, self.config.scan_refill_per_sec),
            OperationClass::PolicyQuery => {
                (self.config.policy_bucket_capacity(), self.config.policy_refill_per_sec())
            }
        };
        self.buckets
            .entry((client.to_string(), class))
            .or_insert_with(|| TokenBucket::new(capacity, refill))
    }

    /// Checks and consumes one token for `client`'s `class` bucket.
    ///
    /// # Errors
    ///
    /// [`SentinelError::ResourceExhausted`] if the bucket is empty.
    pub fn check(&mut self, client: &str, class: OperationClass) -> Result<()> {
        let now = Instant::now();
        let bucket = self.bucket_for(client, class);
        if bucket.try_consume(now) {
            Ok(())
        } else {
            Err(SentinelError::ResourceExhausted(format!(
                "{client} exceeded its {class:?} rate limit"
            )))
        }
    }

    /// Reserves a concurrent-scan slot for `client`. The caller must
    /// call [`Self::end_scan`] once the scan completes, regardless of
    /// outcome.
    ///
    /// # Errors
    ///
    /// [`SentinelError::ResourceExhausted`] if `client` is already at
    /// its concurrency cap.
    pub fn begin_scan(&mut self, client: &str) -> Result<()> {
        let current = *self.concurrent_scans.get(client).unwrap_or(&0);
        if current >= self.config.max_concurrent_scans_per_client {
            return Err(SentinelError::ResourceExhausted(format!(
                "{client} is at its concurrent scan limit ({current})"
            )));
        }
        self.concurrent_scans.insert(client.to_string(), current + 1);
        Ok(())
    }

    /// Releases a concurrent-scan slot reserved by [`Self::begin_scan`].
    pub fn end_scan(&mut self, client: &str) {
        if let Some(count) = self.concurrent_scans.get_mut(client) {
            *count = count.saturating_sub(1);
        }
    }
}
