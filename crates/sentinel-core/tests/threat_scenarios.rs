//! End-to-end scenarios exercised at the `Sentinel` facade. Scenarios 3
//! through 6 require the policy graph, quarantine manager, and threat
//! index, which this crate does not depend on — those are covered by
//! the respective component crates' own test suites and, composed
//! together, by the CLI's integration tests.

use sentinel_core::{Sentinel, SentinelConfig};

#[test]
fn scenario_1_clean_text_file() {
    let mut sentinel = Sentinel::new(SentinelConfig::default()).unwrap();
    let verdict = sentinel
        .scan("scenario-1", "memo.txt", b"Hello World\nThis is a safe document.\n")
        .unwrap();

    assert_eq!(verdict.composite, 0.0);
    assert!(verdict.composite < 0.30);
    assert!(verdict.explanation.contains("clean"));
}

#[test]
fn scenario_2_obvious_malware_like_bytes() {
    let mut sentinel = Sentinel::new(SentinelConfig::default()).unwrap();
    let verdict = sentinel
        .scan(
            "scenario-2",
            "evil.bin",
            b"ptrace setuid socket connect fork exec shellcode keylogger ransomware",
        )
        .unwrap();

    assert!(verdict.composite >= 0.80, "composite was {}", verdict.composite);
    assert!(verdict.explanation.contains("CRITICAL"));
}

#[test]
fn rate_limiter_invariant_bounded_by_burst_plus_rate() {
    let mut config = SentinelConfig::default();
    config.rate_limiter.scan_bucket_capacity = 5.0;
    config.rate_limiter.scan_refill_per_sec = 0.0;
    let mut sentinel = Sentinel::new(config).unwrap();

    let mut successes = 0;
    for i in 0..20 {
        if sentinel
            .scan("burst-client", "payload.bin", format!("distinct payload body {i}").as_bytes())
            .is_ok()
        {
            successes += 1;
        }
    }

    assert_eq!(successes, 5, "only burst capacity should succeed within the window");
}

#[test]
fn repeated_scan_of_identical_bytes_returns_identical_verdict() {
    let mut sentinel = Sentinel::new(SentinelConfig::default()).unwrap();
    let bytes = b"ptrace setuid socket connect fork exec shellcode keylogger ransomware";

    let first = sentinel.scan("cache-client", "evil.bin", bytes).unwrap();
    let second = sentinel.scan("cache-client-2", "evil.bin", bytes).unwrap();

    assert_eq!(first.composite, second.composite);
    assert_eq!(first.level, second.level);
}

#[test]
fn verdict_composite_matches_fixed_weights_within_tolerance() {
    let mut sentinel = Sentinel::new(SentinelConfig::default()).unwrap();
    let verdict = sentinel
        .scan("scenario-invariant", "evil.bin", b"ptrace setuid socket connect fork exec shellcode keylogger ransomware")
        .unwrap();

    let expected = 0.40 * verdict.signature_score + 0.35 * verdict.statistical_score + 0.25 * verdict.behavioral_score;
    assert!((verdict.composite - expected).abs() < 1e-6);
}
