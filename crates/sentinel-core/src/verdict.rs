//! Verdict fusion: turns three independent detector scores into a single
//! classification. Pure arithmetic, no I/O — mirrors the separation
//! `sentinel-council`'s consensus evaluator drew between scoring and
//! orchestration, but the formula itself is new.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Fixed fusion weights. Signature matches are the most specific signal
/// available (a named indicator fired), so it carries the most weight;
/// behavioral category coverage is the coarsest, so it carries the least.
const SIGNATURE_WEIGHT: f64 = 0.40;
const STATISTICAL_WEIGHT: f64 = 0.35;
const BEHAVIORAL_WEIGHT: f64 = 0.25;

const CLEAN_CEILING: f64 = 0.3;
const SUSPICIOUS_CEILING: f64 = 0.6;
const MALICIOUS_CEILING: f64 = 0.8;

/// Classification bucket a composite score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThreatLevel {
    Clean,
    Suspicious,
    Malicious,
    Critical,
}

impl ThreatLevel {
    #[must_use]
    pub fn from_composite(composite: f64) -> Self {
        if composite < CLEAN_CEILING {
            Self::Clean
        } else if composite < SUSPICIOUS_CEILING {
            Self::Suspicious
        } else if composite < MALICIOUS_CEILING {
            Self::Malicious
        } else {
            Self::Critical
        }
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Clean => "clean",
            Self::Suspicious => "suspicious",
            Self::Malicious => "malicious",
            Self::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

/// Result of fusing the three detector sub-scores for one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verdict {
    /// Name of the file this verdict was produced for, carried through for
    /// reporting. Not used in scoring.
    pub filename: String,
    pub signature_score: f64,
    pub statistical_score: f64,
    pub behavioral_score: f64,
    pub composite: f64,
    pub level: ThreatLevel,
    /// 1.0 when the three sub-scores agree closely, 0.0 when they're
    /// maximally spread apart.
    pub confidence: f64,
    pub explanation: String,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

impl Verdict {
    /// Fuses three detector sub-scores (each expected in `[0, 1]`,
    /// clamped if not) into a composite [`Verdict`] for `filename`.
    /// `duration` defaults to zero; the caller should set it from the
    /// actual elapsed scan time once fusion completes.
    #[must_use]
    pub fn fuse(filename: &str, signature_score: f64, statistical_score: f64, behavioral_score: f64) -> Self {
        let sig = signature_score.clamp(0.0, 1.0);
        let stat = statistical_score.clamp(0.0, 1.0);
        let beh = behavioral_score.clamp(0.0, 1.0);

        let composite =
            (SIGNATURE_WEIGHT * sig + STATISTICAL_WEIGHT * stat + BEHAVIORAL_WEIGHT * beh)
                .clamp(0.0, 1.0);
        let level = ThreatLevel::from_composite(composite);
        let confidence = Self::confidence_from_spread(sig, stat, beh);
        let explanation = Self::explain(filename, level, sig, stat, beh);

        Self {
            filename: filename.to_string(),
            signature_score: sig,
            statistical_score: stat,
            behavioral_score: beh,
            composite,
            level,
            confidence,
            explanation,
            duration: Duration::ZERO,
        }
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    fn confidence_from_spread(sig: f64, stat: f64, beh: f64) -> f64 {
        let mean = (sig + stat + beh) / 3.0;
        let variance = ((sig - mean).powi(2) + (stat - mean).powi(2) + (beh - mean).powi(2)) / 3.0;
        let stddev = variance.sqrt();
        (1.0 - stddev / 0.5).clamp(0.0, 1.0)
    }

    fn explain(filename: &str, level: ThreatLevel, sig: f64, stat: f64, beh: f64) -> String {
        let contributions = [
            ("signature", SIGNATURE_WEIGHT * sig),
            ("statistical", STATISTICAL_WEIGHT * stat),
            ("behavioral", BEHAVIORAL_WEIGHT * beh),
        ];
        let (leader, leader_weight) = contributions
            .iter()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .copied()
            .unwrap_or(("signature", 0.0));

        let level_word = if level == ThreatLevel::Critical {
            "CRITICAL".to_string()
        } else {
            level.to_string()
        };

        format!(
            "{filename}: classified {level_word} (dominant signal: {leader}, contributing {leader_weight:.2})"
        )
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(duration.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
