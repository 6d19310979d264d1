//! Typed configuration for the Sentinel facade, loaded by the CLI from a
//! TOML file and validated at construction.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, SentinelError};

/// Top-level Sentinel configuration, composed from per-concern trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentinelConfig {
    pub orchestrator: OrchestratorConfig,
    pub rate_limiter: RateLimiterConfig,
    pub policy: PolicyConfig,
    pub quarantine: QuarantineConfig,
    pub global: GlobalConfig,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            orchestrator: OrchestratorConfig::default(),
            rate_limiter: RateLimiterConfig::default(),
            policy: PolicyConfig::default(),
            quarantine: QuarantineConfig::default(),
            global: GlobalConfig::default(),
        }
    }
}

impl SentinelConfig {
    /// Validates every configured bound, returning the first violation.
    ///
    /// # Errors
    ///
    /// [`SentinelError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        self.orchestrator.validate()?;
        self.rate_limiter.validate()?;
        self.policy.validate()?;
        self.global.validate()?;
        Ok(())
    }
}

/// Orchestrator tuning: cache size and per-scan timeout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Entries held in the verdict LRU cache.
    pub verdict_cache_size: usize,
    /// Maximum wall-clock milliseconds budgeted to a single scan.
    pub scan_timeout_ms: u64,
    /// Maximum file size, in bytes, accepted for analysis.
    pub max_scan_bytes: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            verdict_cache_size: 1024,
            scan_timeout_ms: 5_000,
            max_scan_bytes: 10 * 1024 * 1024 * 1024,
        }
    }
}

impl OrchestratorConfig {
    fn validate(&self) -> Result<()> {
        if self.verdict_cache_size == 0 {
            return Err(SentinelError::Config(
                "orchestrator.verdict_cache_size must be at least 1".into(),
            ));
        }
        if !(100..=300_000).contains(&self.scan_timeout_ms) {
            return Err(SentinelError::Config(
                "orchestrator.scan_timeout_ms must be between 100 and 300000".into(),
            ));
        }
        if !(1024..=10 * 1024 * 1024 * 1024).contains(&self.max_scan_bytes) {
            return Err(SentinelError::Config(
                "orchestrator.max_scan_bytes must be between 1KiB and 10GiB".into(),
            ));
        }
        Ok(())
    }
}

/// Token-bucket limits, per (client, operation class).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub scan_bucket_capacity: f64,
    pub scan_refill_per_sec: f64,
    /// Policy-mutation requests allowed per `rate_window_seconds`. Drives
    /// the policy-query token bucket's capacity and refill rate.
    pub policies_per_minute: u32,
    pub rate_window_seconds: u64,
    pub max_concurrent_scans_per_client: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            scan_bucket_capacity: 100.0,
            scan_refill_per_sec: 10.0,
            policies_per_minute: 100,
            rate_window_seconds: 60,
            max_concurrent_scans_per_client: 8,
        }
    }
}

impl RateLimiterConfig {
    fn validate(&self) -> Result<()> {
        if self.scan_bucket_capacity <= 0.0 {
            return Err(SentinelError::Config(
                "rate_limiter.scan_bucket_capacity must be positive".into(),
            ));
        }
        if self.scan_refill_per_sec < 0.0 {
            return Err(SentinelError::Config(
                "rate_limiter.scan_refill_per_sec must not be negative".into(),
            ));
        }
        if !(1..=1_000).contains(&self.policies_per_minute) {
            return Err(SentinelError::Config(
                "rate_limiter.policies_per_minute must be between 1 and 1000".into(),
            ));
        }
        if !(1..=3_600).contains(&self.rate_window_seconds) {
            return Err(SentinelError::Config(
                "rate_limiter.rate_window_seconds must be between 1 and 3600".into(),
            ));
        }
        if self.max_concurrent_scans_per_client == 0 {
            return Err(SentinelError::Config(
                "rate_limiter.max_concurrent_scans_per_client must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Policy-query bucket capacity derived from `policies_per_minute`.
    #[must_use]
    pub fn policy_bucket_capacity(&self) -> f64 {
        f64::from(self.policies_per_minute)
    }

    /// Policy-query bucket refill rate derived from `policies_per_minute`
    /// spread evenly across `rate_window_seconds`.
    #[must_use]
    pub fn policy_refill_per_sec(&self) -> f64 {
        f64::from(self.policies_per_minute) / self.rate_window_seconds as f64
    }
}

/// Policy graph tuning (match cache size, circuit breaker).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub db_path: PathBuf,
    pub match_cache_size: usize,
    pub circuit_failure_threshold: u32,
    pub circuit_cooldown_secs: u64,
    pub threat_retention_days: i64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./sentinel-data/policy.db"),
            match_cache_size: 1_000,
            circuit_failure_threshold: 5,
            circuit_cooldown_secs: 30,
            threat_retention_days: 30,
        }
    }
}

impl PolicyConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=100_000).contains(&self.match_cache_size) {
            return Err(SentinelError::Config(
                "policy.match_cache_size must be between 1 and 100000".into(),
            ));
        }
        if self.circuit_failure_threshold == 0 {
            return Err(SentinelError::Config(
                "policy.circuit_failure_threshold must be at least 1".into(),
            ));
        }
        if !(1..=3650).contains(&self.threat_retention_days) {
            return Err(SentinelError::Config(
                "policy.threat_retention_days must be between 1 and 3650".into(),
            ));
        }
        Ok(())
    }
}

/// Quarantine directory location (the crate that opens it lives above
/// this one in the dependency order, so only the path is carried here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineConfig {
    pub root: PathBuf,
    pub retention_days: i64,
}

impl Default for QuarantineConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./sentinel-data/quarantine"),
            retention_days: 90,
        }
    }
}

/// Process-wide settings not owned by a single component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// When true, a detector or storage failure degrades the verdict
    /// rather than surfacing an error to the caller.
    pub fail_open_on_detector_error: bool,
    pub log_level: String,
    /// OS threads dedicated to scan processing.
    pub worker_threads: usize,
    /// Whether a quarantine-worthy verdict actually moves the file.
    pub enable_quarantine: bool,
    /// Whether non-clean verdicts are recorded into the threat index.
    pub enable_threat_index: bool,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            fail_open_on_detector_error: true,
            log_level: "info".to_string(),
            worker_threads: 4,
            enable_quarantine: true,
            enable_threat_index: true,
        }
    }
}

impl GlobalConfig {
    fn validate(&self) -> Result<()> {
        if !(1..=64).contains(&self.worker_threads) {
            return Err(SentinelError::Config(
                "global.worker_threads must be between 1 and 64".into(),
            ));
        }
        Ok(())
    }
}
