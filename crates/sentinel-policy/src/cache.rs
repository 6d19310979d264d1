//! Bounded negative-result cache for `match_policy` lookups.
//!
//! Stores `Option<PolicyId>` keyed by a stable fingerprint of the threat
//! tuple that was matched against, so repeat misses on the same
//! fingerprint short-circuit without touching the backing store.

use sentinel_cache::BoundedCache;
use sha2::{Digest, Sha256};

use crate::models::ThreatMetadata;

pub const DEFAULT_CAPACITY: usize = 1_000;

/// Computes the stable fingerprint `match_policy` caches results under.
#[must_use]
pub fn fingerprint(threat: &ThreatMetadata) -> String {
    let mut hasher = Sha256::new();
    hasher.update(threat.content_hash.as_bytes());
    hasher.update(b"\0");
    hasher.update(threat.url.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\0");
    hasher.update(threat.mime_type.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\0");
    for name in &threat.rule_names {
        hasher.update(name.as_bytes());
        hasher.update(b",");
    }
    hex::encode(hasher.finalize())
}

pub struct MatchCache {
    inner: BoundedCache<String, Option<i64>>,
}

impl MatchCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: BoundedCache::new(capacity),
        }
    }

    #[must_use]
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    #[must_use]
    pub fn get(&mut self, fingerprint: &str) -> Option<Option<i64>> {
        self.inner.get(&fingerprint.to_string()).copied()
    }

    pub fn insert(&mut self, fingerprint: String, result: Option<i64>) {
        self.inner.insert(fingerprint, result);
    }

    /// Invalidates the entire cache. Called after any policy mutation —
    /// simplest correct policy; churn from individual policy edits is low
    /// relative to lookup volume.
    pub fn invalidate_all(&mut self) {
        self.inner.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn threat(hash: &str) -> ThreatMetadata {
        ThreatMetadata {
            url: Some("https://example.com/a".into()),
            filename: "a.bin".into(),
            content_hash: hash.into(),
            mime_type: Some("application/octet-stream".into()),
            size_bytes: 10,
            rule_names: vec!["rule-a".into()],
            severity: 5,
        }
    }

    #[test]
    fn fingerprint_is_stable_for_identical_tuples() {
        assert_eq!(fingerprint(&threat("abc")), fingerprint(&threat("abc")));
    }

    #[test]
    fn fingerprint_differs_for_different_hash() {
        assert_ne!(fingerprint(&threat("abc")), fingerprint(&threat("def")));
    }

    #[test]
    fn miss_then_insert_then_hit() {
        let mut cache = MatchCache::new(10);
        let fp = fingerprint(&threat("abc"));
        assert_eq!(cache.get(&fp), None);
        cache.insert(fp.clone(), Some(42));
        assert_eq!(cache.get(&fp), Some(Some(42)));
    }

    #[test]
    fn invalidate_all_clears_every_entry() {
        let mut cache = MatchCache::new(10);
        cache.insert("a".into(), None);
        cache.insert("b".into(), Some(1));
        cache.invalidate_all();
        assert!(cache.is_empty());
    }
}
