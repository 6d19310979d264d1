//! # Detectors
//!
//! Each detector exposes one capability: `analyze(bytes) -> (sub_score
//! in [0,1], explanation)`. `Signature`, `Statistical`, and `Behavioral`
//! are a sealed sum — [`AnyDetector`] enumerates exactly those three —
//! so the orchestrator can iterate the set and combine sub-scores via
//! fixed weights without dynamic registration.

mod behavioral;
mod signature;
mod statistical;

pub use behavioral::BehavioralDetector;
pub use signature::{IndicatorCategory, SignatureDetector};
pub use statistical::{shannon_byte_entropy, StatisticalDetector};

/// Capability every detector exposes: score a byte buffer in isolation.
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;
    /// Returns a sub-score in `[0, 1]` and a short human-readable reason.
    fn analyze(&self, bytes: &[u8]) -> (f64, String);
}

/// Sealed sum of the three detector kinds the orchestrator fuses.
#[derive(Clone)]
pub enum AnyDetector {
    Signature(SignatureDetector),
    Statistical(StatisticalDetector),
    Behavioral(BehavioralDetector),
}

impl AnyDetector {
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![
            Self::Signature(SignatureDetector::new()),
            Self::Statistical(StatisticalDetector::new()),
            Self::Behavioral(BehavioralDetector::new()),
        ]
    }
}

impl Detector for AnyDetector {
    fn name(&self) -> &'static str {
        match self {
            Self::Signature(d) => d.name(),
            Self::Statistical(d) => d.name(),
            Self::Behavioral(d) => d.name(),
        }
    }

    fn analyze(&self, bytes: &[u8]) -> (f64, String) {
        match self {
            Self::Signature(d) => d.analyze(bytes),
            Self::Statistical(d) => d.analyze(bytes),
            Self::Behavioral(d) => d.analyze(bytes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_returns_one_of_each_kind() {
        let detectors = AnyDetector::all();
        assert_eq!(detectors.len(), 3);
        let names: Vec<&str> = detectors.iter().map(Detector::name).collect();
        assert!(names.contains(&"signature"));
        assert!(names.contains(&"statistical"));
        assert!(names.contains(&"behavioral"));
    }
}
