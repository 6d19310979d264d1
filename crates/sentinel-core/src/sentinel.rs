//! The `Sentinel` facade: wires the orchestrator, verdict fusion, and
//! rate limiter into a single entry point for scanning. Policy matching
//! and quarantine live one layer up, in the binary that can depend on
//! every component crate without creating a dependency cycle.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::SentinelConfig;
use crate::error::Result;
use crate::orchestrator::Orchestrator;
use crate::ratelimit::{OperationClass, RateLimiter};
use crate::verdict::Verdict;

/// Unified scanning facade: detector fan-out, verdict fusion, caching,
/// and per-client rate limiting.
pub struct Sentinel {
    config: SentinelConfig,
    orchestrator: Orchestrator,
    limiter: RateLimiter,
}

impl Sentinel {
    /// Builds a `Sentinel` from a validated configuration.
    ///
    /// # Errors
    ///
    /// [`crate::error::SentinelError::Config`] if `config` fails validation.
    pub fn new(config: SentinelConfig) -> Result<Self> {
        config.validate()?;

        let orchestrator = Orchestrator::new(
            config.orchestrator.verdict_cache_size,
            Duration::from_millis(config.orchestrator.scan_timeout_ms),
        );
        let limiter = RateLimiter::new(config.rate_limiter.clone());

        info!(
            cache_size = config.orchestrator.verdict_cache_size,
            timeout_ms = config.orchestrator.scan_timeout_ms,
            "sentinel initialized"
        );

        Ok(Self {
            config,
            orchestrator,
            limiter,
        })
    }

    /// Scans `bytes` (the file named `filename`) on behalf of `client`,
    /// subject to its rate limit.
    ///
    /// # Errors
    ///
    /// [`crate::error::SentinelError::ResourceExhausted`] if `client`'s
    /// scan bucket or concurrency cap is exhausted. The scan itself never
    /// fails.
    pub fn scan(&mut self, client: &str, filename: &str, bytes: &[u8]) -> Result<Verdict> {
        self.limiter.check(client, OperationClass::Scan)?;
        self.limiter.begin_scan(client)?;
        let result = self.orchestrator.scan(filename, bytes);
        self.limiter.end_scan(client);

        if let Ok(verdict) = &result {
            debug!(client, filename, level = %verdict.level, composite = verdict.composite, "scan complete");
        }
        result
    }

    /// Async variant bounded by `orchestrator.scan_timeout_ms`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::scan`].
    pub async fn scan_with_timeout(&mut self, client: &str, filename: &str, bytes: Arc<Vec<u8>>) -> Result<Verdict> {
        self.limiter.check(client, OperationClass::Scan)?;
        self.limiter.begin_scan(client)?;
        let result = self.orchestrator.scan_with_timeout(filename, bytes).await;
        self.limiter.end_scan(client);
        result
    }

    /// Checks `client`'s policy-query bucket without performing a scan.
    ///
    /// # Errors
    ///
    /// [`crate::error::SentinelError::ResourceExhausted`] if exhausted.
    pub fn check_policy_rate(&mut self, client: &str) -> Result<()> {
        self.limiter.check(client, OperationClass::PolicyQuery)
    }

    #[must_use]
    pub fn config(&self) -> &SentinelConfig {
        &self.config
    }

    #[must_use]
    pub fn total_scans(&self) -> u64 {
        self.orchestrator.total_scans()
    }

    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.orchestrator.cache_hits()
    }
}
