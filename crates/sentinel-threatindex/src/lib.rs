//! # Threat Index
//!
//! A probabilistic set of known-bad content fingerprints shared across
//! Sentinel instances. A bloom filter is the canonical membership
//! oracle — no false negatives, occasional false positives — backed by
//! a best-effort enrichment cache and a differentially-private
//! federated sync path for merging observations from peers without
//! exposing individual fingerprints.
//!
//! ## Architecture
//!
//! ```text
//!                    ┌─────────────────┐
//!   add/contains ───▶│   BloomFilter   │◀─── merge (peer sync)
//!                    └─────────────────┘
//!                    ┌─────────────────┐
//!   record/get   ───▶│  MetadataCache  │  (bounded, lossy)
//!                    └─────────────────┘
//!                    ┌─────────────────┐
//!   federated   ───▶│ FederatedAggregator │ (DP-noised gradients)
//!                    └─────────────────┘
//! ```
//!
//! Persistence splits across three files: `<base>.bloom` (bloom filter
//! binary), `<base>.meta` (cache capacity and entry count as JSON),
//! `<base>.cache` (the metadata cache's resident entries as a JSON
//! array). The metadata cache is bounded and lossy under pressure, so a
//! save only ever captures what's still resident at that moment.

mod bloom;
mod error;
mod federated;
mod metadata;

pub use bloom::{BloomFilter, DEFAULT_K, DEFAULT_M};
pub use error::{Result, ThreatIndexError};
pub use federated::{AggregateResult, Contribution, FederatedAggregator, FederatedConfig, NoiseMechanism};
pub use metadata::{MetadataCache, ThreatCategory, ThreatMetadata, DEFAULT_CAPACITY};

use std::path::Path;

/// Facade combining the bloom filter and its enrichment cache behind one
/// handle, with file-based persistence.
pub struct ThreatIndex {
    bloom: BloomFilter,
    metadata: MetadataCache,
}

impl ThreatIndex {
    /// Creates an empty index with the given bloom-filter parameters and
    /// metadata cache capacity.
    #[must_use]
    pub fn new(m: usize, k: usize, metadata_capacity: usize) -> Self {
        Self {
            bloom: BloomFilter::new(m, k),
            metadata: MetadataCache::new(metadata_capacity),
        }
    }

    /// Creates an empty index using the default bloom and cache sizing.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_M, DEFAULT_K, DEFAULT_CAPACITY)
    }

    /// Records `fingerprint` as known-bad, with enrichment metadata.
    pub fn record(
        &mut self,
        fingerprint: &str,
        category: ThreatCategory,
        severity: u8,
        now: chrono::DateTime<chrono::Utc>,
    ) {
        self.bloom.add(fingerprint.as_bytes());
        self.metadata.record(fingerprint, category, severity, now);
    }

    /// Returns `true` if `fingerprint` may be known-bad.
    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.bloom.contains(fingerprint.as_bytes())
    }

    /// Looks up enrichment metadata, if still resident in the bounded cache.
    pub fn metadata(&mut self, fingerprint: &str) -> Option<&ThreatMetadata> {
        self.metadata.get(fingerprint)
    }

    /// Merges a peer's bloom filter into this index's.
    ///
    /// # Errors
    ///
    /// Fails if the peer filter's `(m, k)` differ from this index's.
    pub fn merge_bloom(&mut self, other: &BloomFilter) -> Result<()> {
        self.bloom.merge(other)
    }

    #[must_use]
    pub const fn bloom(&self) -> &BloomFilter {
        &self.bloom
    }

    /// Writes `<base>.bloom` (filter bytes), `<base>.meta` (cache
    /// capacity and entry count), and `<base>.cache` (the metadata
    /// cache's resident entries as a JSON array), matching the on-disk
    /// layout.
    ///
    /// # Errors
    ///
    /// Propagates any IO or serialization failure.
    pub fn save(&self, base: &Path) -> Result<()> {
        std::fs::write(base.with_extension("bloom"), self.bloom.serialize())?;

        let entries = self.metadata.entries();
        let meta = serde_json::json!({
            "capacity": self.metadata.capacity(),
            "entry_count": entries.len(),
        });
        std::fs::write(base.with_extension("meta"), serde_json::to_vec(&meta)?)?;
        std::fs::write(base.with_extension("cache"), serde_json::to_vec(&entries)?)?;
        Ok(())
    }

    /// Loads a saved index from `<base>.bloom`, `<base>.meta`, and
    /// `<base>.cache`, restoring the metadata cache's resident entries
    /// (up to `metadata_capacity`).
    ///
    /// # Errors
    ///
    /// Propagates any IO or deserialization failure.
    pub fn load(base: &Path, metadata_capacity: usize) -> Result<Self> {
        let bloom_bytes = std::fs::read(base.with_extension("bloom"))?;
        let cache_bytes = std::fs::read(base.with_extension("cache"))?;
        let entries: Vec<(String, ThreatMetadata)> = serde_json::from_slice(&cache_bytes)?;

        Ok(Self {
            bloom: BloomFilter::deserialize(&bloom_bytes)?,
            metadata: MetadataCache::from_entries(metadata_capacity, entries),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    #[test]
    fn record_then_contains_and_metadata() {
        let mut index = ThreatIndex::new(10_000, 7, 100);
        let now = Utc::now();
        index.record("deadbeef", ThreatCategory::Malware, 9, now);

        assert!(index.contains("deadbeef"));
        assert_eq!(index.metadata("deadbeef").unwrap().severity, 9);
        assert!(!index.contains("not-recorded-at-all"));
    }

    #[test]
    fn save_then_load_preserves_bloom_membership() {
        let mut index = ThreatIndex::new(10_000, 7, 100);
        index.record("persisted-fingerprint", ThreatCategory::Phishing, 6, Utc::now());

        let dir = tempdir().unwrap();
        let base = dir.path().join("threatindex");
        index.save(&base).unwrap();

        let restored = ThreatIndex::load(&base, 100).unwrap();
        assert!(restored.contains("persisted-fingerprint"));
    }

    #[test]
    fn save_then_load_preserves_enrichment_metadata() {
        let mut index = ThreatIndex::new(10_000, 7, 100);
        let now = Utc::now();
        index.record("persisted-fingerprint", ThreatCategory::Phishing, 6, now);

        let dir = tempdir().unwrap();
        let base = dir.path().join("threatindex");
        index.save(&base).unwrap();

        let mut restored = ThreatIndex::load(&base, 100).unwrap();
        let meta = restored.metadata("persisted-fingerprint").unwrap();
        assert_eq!(meta.category, ThreatCategory::Phishing);
        assert_eq!(meta.severity, 6);
        assert_eq!(meta.first_seen, now);
    }

    #[test]
    fn merge_bloom_combines_peer_observations() {
        let mut index = ThreatIndex::new(10_000, 7, 100);
        let mut peer_bloom = BloomFilter::new(10_000, 7);
        peer_bloom.add(b"peer-known-bad");

        index.merge_bloom(&peer_bloom).unwrap();
        assert!(index.contains("peer-known-bad"));
    }
}
