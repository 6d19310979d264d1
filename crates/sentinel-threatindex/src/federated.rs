//! Federated threat-index updates under a differential-privacy envelope.
//!
//! Peers publish noised observation gradients rather than raw fingerprint
//! data. Each round's accumulated privacy loss is tracked via the advanced
//! composition bound so a long-lived index can refuse to keep averaging
//! once its budget is spent.

use crate::error::{Result, ThreatIndexError};
use rand::Rng;
use rand_distr::{Distribution, Laplace};

/// Noise mechanism used to privatize a contributor's gradient.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseMechanism {
    /// Pure ε-DP: Laplace noise with scale `sensitivity / epsilon`.
    Laplace,
    /// (ε, δ)-DP: Gaussian noise with `σ = sensitivity·√(2·ln(1.25/δ))/epsilon`.
    Gaussian,
}

/// One contributor's privatized submission.
#[derive(Debug, Clone)]
pub struct Contribution {
    pub participant_id: String,
    pub gradient: Vec<f64>,
    /// Privacy budget the contributor claims to have spent producing this gradient.
    pub declared_epsilon: f64,
}

/// Configuration for the federated aggregator.
#[derive(Debug, Clone)]
pub struct FederatedConfig {
    pub mechanism: NoiseMechanism,
    pub epsilon: f64,
    pub delta: f64,
    pub sensitivity: f64,
    pub min_participants: usize,
}

impl Default for FederatedConfig {
    fn default() -> Self {
        Self {
            mechanism: NoiseMechanism::Gaussian,
            epsilon: 1.0,
            delta: 1e-5,
            sensitivity: 1.0,
            min_participants: 100,
        }
    }
}

/// Result of one federated aggregation round.
#[derive(Debug, Clone)]
pub struct AggregateResult {
    pub gradient: Vec<f64>,
    pub participants: usize,
    /// Accumulated privacy loss across all rounds run by this aggregator so far.
    pub accumulated_epsilon: f64,
}

/// Privatizes `gradient` in place by adding calibrated noise to each
/// dimension, per [`FederatedConfig::mechanism`].
///
/// The Gaussian path uses the Box-Muller transform with a fresh pair of
/// uniform draws per call, deliberately discarding the second normal
/// variate rather than caching it across calls — noise generation here
/// is not on a hot path, and a cached spare would require either a
/// `thread_local!` or a lock, neither of which is worth it for one
/// floating-point value.
pub fn privatize(gradient: &[f64], config: &FederatedConfig, rng: &mut impl Rng) -> Vec<f64> {
    match config.mechanism {
        NoiseMechanism::Laplace => {
            let scale = config.sensitivity / config.epsilon;
            let dist = Laplace::new(0.0, scale).expect("scale must be positive");
            gradient.iter().map(|g| g + dist.sample(rng)).collect()
        }
        NoiseMechanism::Gaussian => {
            let sigma =
                config.sensitivity * (2.0 * (1.25 / config.delta).ln()).sqrt() / config.epsilon;
            gradient
                .iter()
                .map(|g| g + gaussian_noise(sigma, rng))
                .collect()
        }
    }
}

fn gaussian_noise(sigma: f64, rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let z0 = (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos();
    z0 * sigma
}

/// Aggregates privatized contributions and tracks accumulated privacy
/// loss across rounds via the advanced composition bound.
pub struct FederatedAggregator {
    config: FederatedConfig,
    rounds: u64,
}

impl FederatedAggregator {
    #[must_use]
    pub const fn new(config: FederatedConfig) -> Self {
        Self { config, rounds: 0 }
    }

    /// Averages the contributions' gradients dimension-wise.
    ///
    /// # Errors
    ///
    /// Rejects the round if: fewer than `min_participants` contributed,
    /// any contributor's declared epsilon exceeds `10 * config.epsilon`,
    /// or gradient dimensions disagree across contributors.
    pub fn aggregate(&mut self, contributions: &[Contribution]) -> Result<AggregateResult> {
        if contributions.len() < self.config.min_participants {
            return Err(ThreatIndexError::AggregationRejected(format!(
                "only {} participants, need at least {}",
                contributions.len(),
                self.config.min_participants
            )));
        }

        let max_declared_epsilon = 10.0 * self.config.epsilon;
        if let Some(offender) = contributions
            .iter()
            .find(|c| c.declared_epsilon > max_declared_epsilon)
        {
            return Err(ThreatIndexError::AggregationRejected(format!(
                "participant {} declared epsilon {} exceeds {}x configured epsilon",
                offender.participant_id, offender.declared_epsilon, 10.0
            )));
        }

        let dimensions = contributions[0].gradient.len();
        if contributions
            .iter()
            .any(|c| c.gradient.len() != dimensions)
        {
            return Err(ThreatIndexError::AggregationRejected(
                "gradient dimension mismatch across contributors".into(),
            ));
        }

        let n = contributions.len() as f64;
        let mut averaged = vec![0.0; dimensions];
        for contribution in contributions {
            for (slot, value) in averaged.iter_mut().zip(contribution.gradient.iter()) {
                *slot += value / n;
            }
        }

        self.rounds += 1;
        let subsampling_rate = (100.0 / contributions.len() as f64).min(1.0);
        let accumulated_epsilon = self.config.epsilon
            * (2.0 * self.rounds as f64 * (1.0 / self.config.delta).ln()).sqrt()
            * subsampling_rate;

        Ok(AggregateResult {
            gradient: averaged,
            participants: contributions.len(),
            accumulated_epsilon,
        })
    }

    #[must_use]
    pub const fn rounds(&self) -> u64 {
        self.rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn contributions(n: usize, epsilon: f64) -> Vec<Contribution> {
        (0..n)
            .map(|i| Contribution {
                participant_id: format!("peer-{i}"),
                gradient: vec![1.0, 2.0, 3.0],
                declared_epsilon: epsilon,
            })
            .collect()
    }

    #[test]
    fn privatize_perturbs_every_dimension() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = FederatedConfig::default();
        let noised = privatize(&[1.0, 1.0, 1.0], &config, &mut rng);
        assert_eq!(noised.len(), 3);
        assert!(noised.iter().any(|v| (*v - 1.0).abs() > 1e-9));
    }

    #[test]
    fn aggregate_rejects_below_min_participants() {
        let mut agg = FederatedAggregator::new(FederatedConfig {
            min_participants: 100,
            ..Default::default()
        });
        let result = agg.aggregate(&contributions(5, 1.0));
        assert!(result.is_err());
    }

    #[test]
    fn aggregate_rejects_excessive_declared_epsilon() {
        let mut agg = FederatedAggregator::new(FederatedConfig {
            min_participants: 2,
            epsilon: 1.0,
            ..Default::default()
        });
        let mut contribs = contributions(2, 1.0);
        contribs[0].declared_epsilon = 50.0;
        assert!(agg.aggregate(&contribs).is_err());
    }

    #[test]
    fn aggregate_rejects_dimension_mismatch() {
        let mut agg = FederatedAggregator::new(FederatedConfig {
            min_participants: 2,
            ..Default::default()
        });
        let mut contribs = contributions(2, 1.0);
        contribs[1].gradient = vec![1.0, 2.0];
        assert!(agg.aggregate(&contribs).is_err());
    }

    #[test]
    fn aggregate_averages_gradients_and_tracks_rounds() {
        let mut agg = FederatedAggregator::new(FederatedConfig {
            min_participants: 2,
            ..Default::default()
        });
        let result = agg.aggregate(&contributions(100, 0.5)).unwrap();
        assert_eq!(result.participants, 100);
        assert!((result.gradient[0] - 1.0).abs() < 1e-9);
        assert!((result.gradient[1] - 2.0).abs() < 1e-9);
        assert!(result.accumulated_epsilon > 0.0);
        assert_eq!(agg.rounds(), 1);

        agg.aggregate(&contributions(100, 0.5)).unwrap();
        assert_eq!(agg.rounds(), 2);
    }
}
