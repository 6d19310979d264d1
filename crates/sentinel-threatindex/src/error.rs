use thiserror::Error;

/// Errors produced by the threat index.
#[derive(Debug, Error)]
pub enum ThreatIndexError {
    #[error("bloom filter parameter mismatch: expected (m={expected_m}, k={expected_k}), got (m={actual_m}, k={actual_k})")]
    ParameterMismatch {
        expected_m: usize,
        expected_k: usize,
        actual_m: usize,
        actual_k: usize,
    },

    #[error("corrupt bloom filter serialization: {0}")]
    Corrupt(String),

    #[error("federated aggregation rejected: {0}")]
    AggregationRejected(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, ThreatIndexError>;
