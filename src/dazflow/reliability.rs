use crate::centrality::measures::sanitize;
use serde::{Deserialize, Serialize};

/// Symmetric normal-approximation interval around one curve probability.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

/// Success probability per payment amount, ascending by amount.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ReliabilityCurve {
    pub amounts: Vec<u64>,
    pub probabilities: Vec<f64>,
    pub confidence_intervals: Vec<ConfidenceInterval>,
    /// Amounts whose probability reaches the recommendation threshold.
    pub recommended_amounts: Vec<u64>,
}

/// Node-level multipliers applied on top of the raw max-flow probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveFactors {
    pub balance_symmetry: f64,
    pub outbound_liquidity: u64,
    pub active_channel_ratio: f64,
    pub betweenness: f64,
    pub historical_success_rate: f64,
    /// Sample size behind the confidence intervals.
    pub channel_count: usize,
}

impl CurveFactors {
    /// Balance symmetry times how much of `amount` local liquidity covers.
    pub fn liquidity_factor(&self, amount: u64) -> f64 {
        let coverage = if amount == 0 {
            1.0
        } else {
            (self.outbound_liquidity as f64 / amount as f64).min(1.0)
        };
        sanitize(self.balance_symmetry * coverage)
    }

    /// Active-channel share times betweenness.
    pub fn connectivity_factor(&self) -> f64 {
        sanitize(self.active_channel_ratio * self.betweenness)
    }
}

impl ReliabilityCurve {
    /// Scale each base probability by the node factors.
    ///
    /// `amounts` must already be ascending; `base` gives the unscaled
    /// probability for one amount and must be non-increasing in it.
    pub fn build(
        amounts: &[u64],
        base: impl Fn(u64) -> f64,
        factors: &CurveFactors,
        confidence_z: f64,
        recommendation_threshold: f64,
    ) -> Self {
        let connectivity = factors.connectivity_factor();
        let mut curve = ReliabilityCurve {
            amounts: amounts.to_vec(),
            ..Default::default()
        };
        for &amount in amounts {
            let p = sanitize(
                base(amount)
                    * factors.liquidity_factor(amount)
                    * connectivity
                    * factors.historical_success_rate,
            );
            curve.probabilities.push(p);
            curve
                .confidence_intervals
                .push(confidence_interval(p, factors.channel_count, confidence_z));
            if p >= recommendation_threshold {
                curve.recommended_amounts.push(amount);
            }
        }
        curve
    }

    /// `Σ(amount · p) / Σ amount`; 0 for an empty curve.
    pub fn weighted_index(&self) -> f64 {
        let total: f64 = self.amounts.iter().map(|&a| a as f64).sum();
        if total <= 0.0 {
            return 0.0;
        }
        let weighted: f64 = self
            .amounts
            .iter()
            .zip(&self.probabilities)
            .map(|(&a, p)| a as f64 * p)
            .sum();
        sanitize(weighted / total)
    }
}

/// `p ± z·sqrt(p(1-p)/n)` clamped to `[0, 1]`, with `n` at least 1.
pub fn confidence_interval(p: f64, samples: usize, z: f64) -> ConfidenceInterval {
    let n = samples.max(1) as f64;
    let margin = z.abs() * (p * (1.0 - p) / n).sqrt();
    ConfidenceInterval {
        lower: sanitize(p - margin),
        upper: sanitize(p + margin),
    }
}
