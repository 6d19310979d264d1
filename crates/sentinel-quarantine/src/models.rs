use serde::{Deserialize, Serialize};

/// Threat-level snapshot taken at quarantine time. Deliberately a small
/// local enum rather than a dependency on the orchestrator's verdict
/// type — this crate sits below `sentinel-core` in the build order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    Clean,
    Suspicious,
    Malicious,
    Critical,
}

/// A quarantined file's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuarantineRecord {
    pub id: i64,
    pub original_path: String,
    pub quarantine_path: String,
    pub reason: String,
    pub threat_level: ThreatLevel,
    pub composite_score: f64,
    pub quarantined_at: chrono::DateTime<chrono::Utc>,
    pub size_bytes: u64,
    /// 64-char hex SHA-256 of the original content. Unique across live records.
    pub sha256_hash: String,
}
