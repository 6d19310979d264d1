//! Fans a scan out to every detector, fuses the result, and caches it.
//!
//! The verdict cache is a direct generalization of the context
//! manager's bounded, LRU-evicting frame buffer: here the bounded
//! structure holds `(fingerprint -> Verdict)` instead of `(step ->
//! Frame)`, but the eviction discipline is the same.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};
use sentinel_cache::BoundedCache;
use sentinel_detectors::{AnyDetector, Detector};

use crate::error::Result;
use crate::verdict::Verdict;

fn fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Detector scores cached by content hash. Deliberately excludes
/// `filename`: the same bytes under two different names must still hit
/// the cache and come back with a verdict carrying the name of *this*
/// call, not whichever name first populated the entry.
#[derive(Clone)]
struct CachedScores {
    signature: f64,
    statistical: f64,
    behavioral: f64,
    duration: Duration,
    degraded: bool,
}

/// Runs the detector fan-out and verdict fusion, with an LRU cache keyed
/// by content hash so repeated scans of the same bytes are free.
pub struct Orchestrator {
    detectors: Vec<AnyDetector>,
    cache: BoundedCache<String, CachedScores>,
    scan_timeout: Duration,
    total_scans: u64,
    cache_hits: u64,
}

impl Orchestrator {
    #[must_use]
    pub fn new(cache_capacity: usize, scan_timeout: Duration) -> Self {
        Self {
            detectors: AnyDetector::all(),
            cache: BoundedCache::new(cache_capacity),
            scan_timeout,
            total_scans: 0,
            cache_hits: 0,
        }
    }

    /// Scans `bytes` (from a file named `filename`, carried through for
    /// reporting only) synchronously: one pass over each detector, fused
    /// into a single [`Verdict`]. A detector that panics contributes a
    /// sub-score of 0 rather than aborting the scan — a single faulty
    /// detector must not take down analysis of an otherwise-scannable
    /// file. An empty buffer scores Clean without running any detector:
    /// there is nothing in it to analyze, and refusing it would make the
    /// caller special-case zero-length files.
    ///
    /// # Errors
    ///
    /// Never fails; detector panics and timeouts degrade the verdict
    /// instead of propagating.
    pub fn scan(&mut self, filename: &str, bytes: &[u8]) -> Result<Verdict> {
        self.total_scans += 1;

        if bytes.is_empty() {
            return Ok(Verdict::fuse(filename, 0.0, 0.0, 0.0));
        }

        let key = fingerprint(bytes);
        if let Some(cached) = self.cache.get(&key) {
            self.cache_hits += 1;
            return Ok(Self::verdict_from_cache(filename, cached));
        }

        let started = Instant::now();
        let mut scores = [0.0_f64; 3];
        for (i, detector) in self.detectors.iter().enumerate() {
            scores[i] = run_detector(detector, bytes);
        }

        let cached = CachedScores {
            signature: scores[0],
            statistical: scores[1],
            behavioral: scores[2],
            duration: started.elapsed(),
            degraded: false,
        };
        self.cache.insert(key, cached.clone());
        Ok(Self::verdict_from_cache(filename, &cached))
    }

    /// Scans `bytes` with a bound on wall-clock time. On expiry, returns
    /// a degraded verdict built only from detectors that completed,
    /// rather than failing the scan outright. An empty buffer scores
    /// Clean without running any detector.
    ///
    /// # Errors
    ///
    /// Never fails; detector panics and timeouts degrade the verdict
    /// instead of propagating.
    pub async fn scan_with_timeout(&mut self, filename: &str, bytes: Arc<Vec<u8>>) -> Result<Verdict> {
        self.total_scans += 1;

        if bytes.is_empty() {
            return Ok(Verdict::fuse(filename, 0.0, 0.0, 0.0));
        }

        let key = fingerprint(&bytes);
        if let Some(cached) = self.cache.get(&key) {
            self.cache_hits += 1;
            return Ok(Self::verdict_from_cache(filename, cached));
        }

        let started = Instant::now();
        let mut scores = [0.0_f64; 3];
        let mut any_expired = false;

        for (i, detector) in self.detectors.iter().enumerate() {
            let detector = detector.clone();
            let data = Arc::clone(&bytes);
            let result = tokio::time::timeout(
                self.scan_timeout,
                tokio::task::spawn_blocking(move || run_detector(&detector, &data)),
            )
            .await;

            scores[i] = match result {
                Ok(Ok(score)) => score,
                Ok(Err(_)) | Err(_) => {
                    any_expired = true;
                    0.0
                }
            };
        }

        let cached = CachedScores {
            signature: scores[0],
            statistical: scores[1],
            behavioral: scores[2],
            duration: started.elapsed(),
            degraded: any_expired,
        };
        self.cache.insert(key, cached.clone());
        Ok(Self::verdict_from_cache(filename, &cached))
    }

    fn verdict_from_cache(filename: &str, cached: &CachedScores) -> Verdict {
        let mut verdict = Verdict::fuse(filename, cached.signature, cached.statistical, cached.behavioral)
            .with_duration(cached.duration);
        if cached.degraded {
            verdict.confidence *= 0.5;
            verdict.explanation = format!("{} (degraded: one or more detectors timed out)", verdict.explanation);
        }
        verdict
    }

    #[must_use]
    pub fn total_scans(&self) -> u64 {
        self.total_scans
    }

    #[must_use]
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

fn run_detector(detector: &AnyDetector, bytes: &[u8]) -> f64 {
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| detector.analyze(bytes))) {
        Ok((score, _explanation)) => score,
        Err(_) => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_scan_hits_cache() {
        let mut orchestrator = Orchestrator::new(16, Duration::from_secs(5));
        let bytes = b"hello world, nothing suspicious here".to_vec();

        orchestrator.scan("a.txt", &bytes).unwrap();
        orchestrator.scan("a.txt", &bytes).unwrap();

        assert_eq!(orchestrator.total_scans(), 2);
        assert_eq!(orchestrator.cache_hits(), 1);
    }

    #[test]
    fn empty_input_scores_clean() {
        let mut orchestrator = Orchestrator::new(16, Duration::from_secs(5));
        let verdict = orchestrator.scan("empty.txt", &[]).unwrap();
        assert_eq!(verdict.composite, 0.0);
        assert_eq!(verdict.level, crate::ThreatLevel::Clean);
    }

    #[test]
    fn cache_hit_reports_the_calling_filename_not_the_original() {
        let mut orchestrator = Orchestrator::new(16, Duration::from_secs(5));
        let bytes = b"hello world, nothing suspicious here".to_vec();

        orchestrator.scan("first.txt", &bytes).unwrap();
        let second = orchestrator.scan("second.txt", &bytes).unwrap();

        assert_eq!(second.filename, "second.txt");
        assert!(second.explanation.contains("second.txt"));
    }

    #[test]
    fn clean_text_scores_below_suspicious() {
        let mut orchestrator = Orchestrator::new(16, Duration::from_secs(5));
        let verdict = orchestrator
            .scan("memo.txt", b"Quarterly report: revenue increased 4% year over year.")
            .unwrap();
        assert_eq!(verdict.composite, 0.0);
    }

    #[test]
    fn malware_token_soup_scores_critical() {
        let mut orchestrator = Orchestrator::new(16, Duration::from_secs(5));
        let verdict = orchestrator
            .scan("evil.bin", b"ptrace setuid socket connect fork exec shellcode keylogger ransomware")
            .unwrap();
        assert!(verdict.composite >= 0.80, "composite was {}", verdict.composite);
    }

    #[tokio::test]
    async fn async_scan_matches_sync_scan() {
        let mut orchestrator = Orchestrator::new(16, Duration::from_secs(5));
        let bytes = Arc::new(b"ptrace setuid socket connect fork exec shellcode keylogger ransomware".to_vec());
        let verdict = orchestrator.scan_with_timeout("evil.bin", bytes).await.unwrap();
        assert!(verdict.composite >= 0.80);
    }

    #[tokio::test]
    async fn async_empty_input_scores_clean() {
        let mut orchestrator = Orchestrator::new(16, Duration::from_secs(5));
        let verdict = orchestrator.scan_with_timeout("empty.bin", Arc::new(Vec::new())).await.unwrap();
        assert_eq!(verdict.composite, 0.0);
    }

    #[test]
    fn cache_evicts_past_capacity() {
        let mut orchestrator = Orchestrator::new(2, Duration::from_secs(5));
        orchestrator.scan("alpha.txt", b"alpha content one").unwrap();
        orchestrator.scan("beta.txt", b"beta content two").unwrap();
        orchestrator.scan("gamma.txt", b"gamma content three").unwrap();
        assert!(orchestrator.cache_len() <= 2);
    }
}
