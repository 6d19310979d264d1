//! Crate-level smoke tests tying the public surface together.

use crate::{Sentinel, SentinelConfig, ThreatLevel, Verdict};

#[test]
fn public_surface_compiles_and_links() {
    let config = SentinelConfig::default();
    let _sentinel = Sentinel::new(config).unwrap();
    let verdict: Verdict = Verdict::fuse("sample.txt", 0.0, 0.0, 0.0);
    assert_eq!(verdict.level, ThreatLevel::Clean);
}
