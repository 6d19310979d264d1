//! Enrichment metadata for fingerprints known to the bloom filter.
//!
//! The bloom filter alone can only answer "is this fingerprint possibly
//! known-bad"; this module keeps a best-effort companion record of why,
//! for the fraction of entries still resident in the bounded cache.

use sentinel_cache::BoundedCache;
use serde::{Deserialize, Serialize};

/// Default capacity of the metadata cache.
pub const DEFAULT_CAPACITY: usize = 100_000;

/// Category of a known threat fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatCategory {
    Malware,
    Phishing,
    Exploit,
    Pup,
    Unknown,
}

/// Enrichment record for one fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreatMetadata {
    pub category: ThreatCategory,
    /// Severity on a 1 (low) to 10 (critical) scale.
    pub severity: u8,
    pub first_seen: chrono::DateTime<chrono::Utc>,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

impl ThreatMetadata {
    #[must_use]
    pub fn new(category: ThreatCategory, severity: u8, now: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            category,
            severity: severity.clamp(1, 10),
            first_seen: now,
            last_updated: now,
        }
    }

    /// Updates severity and category in place, bumping `last_updated`.
    /// `first_seen` is never altered by a re-observation.
    pub fn observe_again(&mut self, category: ThreatCategory, severity: u8, now: chrono::DateTime<chrono::Utc>) {
        self.category = category;
        self.severity = severity.clamp(1, 10);
        self.last_updated = now;
    }
}

/// Bounded, lossy-under-pressure metadata store keyed by hex fingerprint.
pub struct MetadataCache {
    inner: BoundedCache<String, ThreatMetadata>,
}

impl MetadataCache {
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

    /// Records or refreshes metadata for `fingerprint`.
    pub fn record(
        &mut self,
        fingerprint: impl Into<String>,
        category: ThreatCategory,
        severity: u8,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        let fingerprint = fingerprint.into();
        if let Some(existing) = self.inner.get(&fingerprint) {
            let mut updated = existing.clone();
            updated.observe_again(category, severity, now);
            self.inner.insert(fingerprint, updated);
        } else {
            self.inner
                .insert(fingerprint, ThreatMetadata::new(category, severity, now));
        }
    }

    #[must_use]
    pub fn get(&mut self, fingerprint: &str) -> Option<&ThreatMetadata> {
        self.inner.get(&fingerprint.to_string())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Configured maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    /// Snapshots every entry still resident in the cache, for persistence.
    /// Entries evicted before the snapshot is taken are lost — this cache
    /// is bounded and lossy by design, and so is its save file.
    #[must_use]
    pub fn entries(&self) -> Vec<(String, ThreatMetadata)> {
        self.inner.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }

    /// Rebuilds a cache of `capacity` from a previously snapshotted entry
    /// list, restoring the entries it still has room for.
    #[must_use]
    pub fn from_entries(capacity: usize, entries: Vec<(String, ThreatMetadata)>) -> Self {
        let mut cache = Self::new(capacity);
        for (fingerprint, metadata) in entries {
            cache.inner.insert(fingerprint, metadata);
        }
        cache
    }
}
