use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid glob pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("policy {0} not found")]
    NotFound(i64),

    #[error("invalid policy: {0}")]
    InvalidPolicy(String),

    #[error("circuit breaker open, backing store unavailable")]
    CircuitOpen,

    #[error("schema version {found} is newer than supported version {current}")]
    SchemaTooNew { found: u32, current: u32 },
}

pub type Result<T> = std::result::Result<T, PolicyError>;
