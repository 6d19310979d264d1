//! Statistical classifier.
//!
//! Combines two signals that need no sandbox or static signature
//! database: Shannon entropy over the raw byte stream (packed/encoded
//! payloads read as unusually random) and term-frequency density
//! against a small suspicious-vocabulary table (malware-adjacent jargon
//! appearing far more densely than in ordinary text). Each signal is
//! normalized to `[0, 1]` independently and the detector reports their
//! average.

use std::collections::HashMap;

use crate::Detector;

/// Below this, text is considered ordinary prose/code; above, suspicious.
const ENTROPY_BASELINE: f64 = 4.2;
/// Entropy at or above this saturates the entropy signal to 1.0.
const ENTROPY_CEILING: f64 = 7.2;

const SUSPICIOUS_VOCABULARY: &[&str] = &[
    "ptrace",
    "setuid",
    "fork",
    "exec",
    "shellcode",
    "keylogger",
    "ransomware",
    "socket",
    "connect",
    "payload",
    "inject",
    "obfuscate",
];

/// Entropy + vocabulary-density scoring.
#[derive(Clone)]
pub struct StatisticalDetector;

impl StatisticalDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for StatisticalDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StatisticalDetector {
    fn name(&self) -> &'static str {
        "statistical"
    }

    fn analyze(&self, bytes: &[u8]) -> (f64, String) {
        if bytes.is_empty() {
            return (0.0, "empty input".to_string());
        }

        let entropy = shannon_byte_entropy(bytes);
        let entropy_signal =
            ((entropy - ENTROPY_BASELINE) / (ENTROPY_CEILING - ENTROPY_BASELINE)).clamp(0.0, 1.0);

        let text = String::from_utf8_lossy(bytes).to_lowercase();
        let words: Vec<&str> = text.split_whitespace().collect();
        let vocabulary_signal = if words.is_empty() {
            0.0
        } else {
            let hits = words
                .iter()
                .filter(|w| SUSPICIOUS_VOCABULARY.iter().any(|term| w.contains(term)))
                .count();
            (hits as f64 / words.len() as f64 * 2.5).min(1.0)
        };

        let score = 0.2 * entropy_signal + 0.8 * vocabulary_signal;
        let explanation = format!(
            "entropy={entropy:.2} bits/byte, vocabulary density signal={vocabulary_signal:.2}"
        );
        (score, explanation)
    }
}

/// Shannon entropy in bits per byte over the 256-symbol byte alphabet,
/// per the same formula used for character-level entropy elsewhere in
/// this codebase, generalized from `char` to raw `u8`.
#[must_use]
pub fn shannon_byte_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<u8, usize> = HashMap::new();
    for &b in bytes {
        *freq.entry(b).or_insert(0) += 1;
    }

    let total = bytes.len() as f64;
    freq.values().fold(0.0, |entropy, &count| {
        let p = count as f64 / total;
        entropy - p * p.log2()
    })
}
