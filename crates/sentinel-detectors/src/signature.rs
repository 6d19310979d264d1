//! Pattern-based signature detector.
//!
//! Scores content by matching known malicious-indicator regexes, each
//! tagged with a category and a confidence weight — the same
//! category/confidence/description shape used for prompt-injection
//! pattern matching elsewhere in this codebase, repurposed here for
//! malware indicator tokens instead of injection phrasing.

use regex::Regex;

use crate::Detector;

/// What kind of malicious capability a matched pattern indicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorCategory {
    ProcessManipulation,
    PrivilegeEscalation,
    NetworkActivity,
    PayloadDelivery,
    DataTheft,
}

#[derive(Clone)]
struct Indicator {
    pattern: Regex,
    #[allow(dead_code)]
    category: IndicatorCategory,
    weight: f64,
    description: &'static str,
}

/// Regex/weight scoring over known malware-indicator tokens.
#[derive(Clone)]
pub struct SignatureDetector {
    indicators: Vec<Indicator>,
}

impl SignatureDetector {
    #[must_use]
    pub fn new() -> Self {
        Self {
            indicators: build_indicators(),
        }
    }
}

impl Default for SignatureDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for SignatureDetector {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn analyze(&self, bytes: &[u8]) -> (f64, String) {
        let text = String::from_utf8_lossy(bytes);
        let mut score = 0.0f64;
        let mut matched: Vec<&str> = Vec::new();

        for indicator in &self.indicators {
            if indicator.pattern.is_match(&text) {
                score += indicator.weight;
                matched.push(indicator.description);
            }
        }

        let score = score.min(1.0);
        let explanation = if matched.is_empty() {
            "no known signature matched".to_string()
        } else {
            format!("matched indicators: {}", matched.join(", "))
        };
        (score, explanation)
    }
}

fn build_indicators() -> Vec<Indicator> {
    vec![
        Indicator {
            pattern: Regex::new(r"(?i)\bptrace\b").unwrap(),
            category: IndicatorCategory::ProcessManipulation,
            weight: 0.22,
            description: "ptrace (process tracing/injection)",
        },
        Indicator {
            pattern: Regex::new(r"(?i)\bsetuid\b").unwrap(),
            category: IndicatorCategory::PrivilegeEscalation,
            weight: 0.22,
            description: "setuid (privilege escalation)",
        },
        Indicator {
            pattern: Regex::new(r"(?i)\bsocket\s+connect\b").unwrap(),
            category: IndicatorCategory::NetworkActivity,
            weight: 0.15,
            description: "raw socket connect",
        },
        Indicator {
            pattern: Regex::new(r"(?i)\bfork\b").unwrap(),
            category: IndicatorCategory::ProcessManipulation,
            weight: 0.15,
            description: "fork (process spawning)",
        },
        Indicator {
            pattern: Regex::new(r"(?i)\bexec\b").unwrap(),
            category: IndicatorCategory::ProcessManipulation,
            weight: 0.15,
            description: "exec (process replacement)",
        },
        Indicator {
            pattern: Regex::new(r"(?i)\bshellcode\b").unwrap(),
            category: IndicatorCategory::PayloadDelivery,
            weight: 0.25,
            description: "shellcode payload",
        },
        Indicator {
            pattern: Regex::new(r"(?i)\bkeylogger\b").unwrap(),
            category: IndicatorCategory::DataTheft,
            weight: 0.25,
            description: "keylogger",
        },
        Indicator {
            pattern: Regex::new(r"(?i)\bransomware\b").unwrap(),
            category: IndicatorCategory::PayloadDelivery,
            weight: 0.3,
            description: "ransomware",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_scores_zero() {
        let detector = SignatureDetector::new();
        let (score, _) = detector.analyze(b"Hello World\nThis is a safe document.\n");
        assert_eq!(score, 0.0);
    }

    #[test]
    fn malware_token_soup_scores_at_ceiling() {
        let detector = SignatureDetector::new();
        let text = b"ptrace setuid socket connect fork exec shellcode keylogger ransomware";
        let (score, explanation) = detector.analyze(text);
        assert_eq!(score, 1.0);
        assert!(explanation.contains("ransomware"));
    }

    #[test]
    fn single_indicator_contributes_partial_score() {
        let detector = SignatureDetector::new();
        let (score, _) = detector.analyze(b"this file calls fork() once");
        assert!(score > 0.0 && score < 1.0);
    }
}
