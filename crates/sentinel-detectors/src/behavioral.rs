//! Behavioral detector.
//!
//! The real sandbox that would execute a file and observe its syscalls
//! is an external collaborator (see the crate-level docs) — this
//! implementation is the static stand-in that satisfies the same
//! `(f64, String)` contract: it scores how many distinct categories of
//! dangerous *capability* (process control, privilege escalation,
//! network access, payload delivery) the static content references,
//! without attempting to run it.

use crate::Detector;

struct Category {
    name: &'static str,
    terms: &'static [&'static str],
}

const CATEGORIES: &[Category] = &[
    Category {
        name: "process control",
        terms: &["ptrace", "fork", "exec"],
    },
    Category {
        name: "privilege escalation",
        terms: &["setuid", "sudo", "chmod 777"],
    },
    Category {
        name: "network access",
        terms: &["socket connect", "reverse shell", "c2"],
    },
    Category {
        name: "payload delivery",
        terms: &["shellcode", "keylogger", "ransomware"],
    },
];

/// Static stand-in for a sandboxed behavior trace.
#[derive(Clone)]
pub struct BehavioralDetector;

impl BehavioralDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for BehavioralDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for BehavioralDetector {
    fn name(&self) -> &'static str {
        "behavioral"
    }

    fn analyze(&self, bytes: &[u8]) -> (f64, String) {
        let text = String::from_utf8_lossy(bytes).to_lowercase();
        let mut matched_categories: Vec<&str> = Vec::new();

        for category in CATEGORIES {
            if category.terms.iter().any(|term| text.contains(term)) {
                matched_categories.push(category.name);
            }
        }

        let score = (matched_categories.len() as f64 / CATEGORIES.len() as f64).min(1.0);
        let explanation = if matched_categories.is_empty() {
            "no behavioral capability categories referenced".to_string()
        } else {
            format!(
                "capability categories referenced: {}",
                matched_categories.join(", ")
            )
        };
        (score, explanation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_scores_zero() {
        let detector = BehavioralDetector::new();
        let (score, _) = detector.analyze(b"Hello World\nThis is a safe document.\n");
        assert_eq!(score, 0.0);
    }

    #[test]
    fn all_categories_present_scores_at_ceiling() {
        let detector = BehavioralDetector::new();
        let text = b"ptrace setuid socket connect fork exec shellcode keylogger ransomware";
        let (score, _) = detector.analyze(text);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn single_category_scores_partial() {
        let detector = BehavioralDetector::new();
        let (score, _) = detector.analyze(b"this program calls fork() only");
        assert!((score - 0.25).abs() < 1e-9);
    }
}
