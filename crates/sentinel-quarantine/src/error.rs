use thiserror::Error;

#[derive(Debug, Error)]
pub enum QuarantineError {
    #[error("file with hash {0} is already quarantined")]
    AlreadyQuarantined(String),

    #[error("quarantine record {0} not found")]
    NotFound(i64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("decryption failed, blob may be corrupt or key mismatched")]
    DecryptionFailed,

    #[error("corrupt quarantine blob for record {0}")]
    CorruptBlob(i64),

    #[error("invalid key file: {0}")]
    InvalidKeyFile(String),
}

pub type Result<T> = std::result::Result<T, QuarantineError>;
