//! Error taxonomy for sentinel-core.

use thiserror::Error;

/// Core error type for orchestration, verdict fusion, and rate limiting.
#[derive(Debug, Error)]
pub enum SentinelError {
    /// A request argument was structurally invalid (e.g. empty byte slice).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced entity (cache key, policy id) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A mutation conflicted with existing state (e.g. duplicate hash).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A rate limit or concurrency bound was exceeded.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// A backing store is temporarily or permanently unavailable.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Persisted data failed an integrity check on read.
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),

    /// A differential-privacy parameter was rejected (insufficient
    /// participants, declared epsilon too large).
    #[error("privacy violation: {0}")]
    PrivacyViolation(String),

    /// A scan exceeded its allotted time budget.
    #[error("scan timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for conditions that should not occur in a correctly
    /// wired system.
    #[error("internal error: {0}")]
    Internal(String),

    /// Passthrough from the policy graph.
    #[error("policy error: {0}")]
    Policy(#[from] sentinel_policy::PolicyError),

    /// Passthrough from the threat index.
    #[error("threat index error: {0}")]
    ThreatIndex(#[from] sentinel_threatindex::ThreatIndexError),
}

pub type Result<T> = std::result::Result<T, SentinelError>;
