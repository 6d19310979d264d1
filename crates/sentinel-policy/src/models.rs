use serde::{Deserialize, Serialize};

/// Action a matched policy, or the caller's default, takes on a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Allow,
    Block,
    Quarantine,
    BlockAutofill,
    WarnUser,
}

/// Which field a policy was authored to primarily match on. Informational —
/// `match_policy` always tries hash, then URL glob, then rule name in that
/// order regardless of this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchType {
    Hash,
    UrlPattern,
    RuleName,
}

/// A persistent policy rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: i64,
    pub rule_name: String,
    /// Wildcard glob pattern, matched against `ThreatMetadata::url`.
    pub url_pattern: Option<String>,
    /// Exact 64-char hex SHA-256 to match against `ThreatMetadata::content_hash`.
    pub file_hash: Option<String>,
    pub mime_type: Option<String>,
    pub action: Action,
    pub match_type: MatchType,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub creator: String,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
    pub hit_count: u64,
    pub last_hit_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Policy {
    /// Returns `true` if the policy is expired as of `now`.
    #[must_use]
    pub fn is_expired(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| expiry <= now)
    }
}

/// Immutable snapshot fed into `match_policy` and recorded alongside verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatMetadata {
    pub url: Option<String>,
    pub filename: String,
    /// 64-char hex SHA-256 of the scanned content.
    pub content_hash: String,
    pub mime_type: Option<String>,
    pub size_bytes: u64,
    pub rule_names: Vec<String>,
    pub severity: u8,
}

/// Append-only history row linking a threat observation to the action taken.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatRecord {
    pub id: i64,
    pub policy_id: Option<i64>,
    pub threat: ThreatMetadata,
    pub action_taken: Action,
    /// Serialized verdict payload (opaque to the policy graph).
    pub verdict_json: String,
    pub detected_at: chrono::DateTime<chrono::Utc>,
}

/// One queued change in a [`crate::PolicyTransaction`]. Applied in order,
/// atomically, by [`crate::storage::Storage::apply_transaction`].
#[derive(Debug, Clone)]
pub enum PolicyMutation {
    Insert(Policy),
    Update(Policy),
    Delete(i64),
}
