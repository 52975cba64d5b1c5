use crate::core::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default payment-amount ladder (sats) used for reliability curves.
pub const DEFAULT_PAYMENT_AMOUNTS: [u64; 5] = [1_000, 10_000, 100_000, 1_000_000, 10_000_000];

/// How to treat a channel with a balance above its capacity, or whose
/// directional balances overshoot it by more than `balance_tolerance_sats`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalancePolicy {
    /// Discard the reported balances and assume capacity/2 on each side.
    SplitEvenly,
    /// Scale both balances down proportionally so they sum to capacity.
    Scale,
    /// Refuse to build the snapshot.
    Reject,
}

/// Tunables for every approximate or sampled computation in the engine.
///
/// All fields have defaults, so a partial JSON document is a valid config.
///
/// # Examples
///
/// ```
/// use dazflow_engine::core::config::AnalysisConfig;
///
/// let config: AnalysisConfig =
///     serde_json::from_str(r#"{ "betweenness_sample_cap": 50 }"#).unwrap();
/// assert_eq!(config.betweenness_sample_cap, 50);
/// assert_eq!(config.eigenvector_max_iterations, 1000);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Maximum number of Brandes pivots; exact when `>= node count`.
    pub betweenness_sample_cap: usize,
    /// Maximum number of BFS pivots used to estimate closeness.
    pub closeness_sample_cap: usize,
    pub eigenvector_max_iterations: usize,
    pub eigenvector_tolerance: f64,
    /// Worker threads for hopness fan-out.
    pub hopness_workers: usize,
    pub hopness_task_timeout_ms: u64,
    /// Number of sources sampled when the caller does not name any.
    pub hopness_sample_size: usize,
    /// Size of the "top hubs by degree" set used for reachability.
    pub hub_count: usize,
    /// Seed for every sampling decision, so results are reproducible.
    pub sampling_seed: u64,
    pub balance_policy: BalancePolicy,
    /// Combined overshoot that is scaled down to capacity instead of
    /// going through `balance_policy`.
    pub balance_tolerance_sats: u64,
    pub payment_amounts: Vec<u64>,
    /// Prior payment success rate folded into the reliability curve.
    pub historical_success_rate: f64,
    /// Degree at which the hubness degree component saturates.
    pub degree_cap: usize,
    /// Weighted degree (sats) at which the hubness capacity component saturates.
    pub capacity_cap_sats: u64,
    /// z-score for reliability confidence intervals.
    pub confidence_z: f64,
    /// Minimum probability for an amount to be recommended.
    pub recommendation_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            betweenness_sample_cap: 1000,
            closeness_sample_cap: 1000,
            eigenvector_max_iterations: 1000,
            eigenvector_tolerance: 1e-6,
            hopness_workers: default_workers(),
            hopness_task_timeout_ms: 30_000,
            hopness_sample_size: 100,
            hub_count: 10,
            sampling_seed: 42,
            balance_policy: BalancePolicy::SplitEvenly,
            balance_tolerance_sats: 1_000,
            payment_amounts: DEFAULT_PAYMENT_AMOUNTS.to_vec(),
            historical_success_rate: 0.85,
            degree_cap: 100,
            capacity_cap_sats: 100_000_000,
            confidence_z: 1.96,
            recommendation_threshold: 0.8,
        }
    }
}

impl AnalysisConfig {
    pub fn hopness_timeout(&self) -> Duration {
        Duration::from_millis(self.hopness_task_timeout_ms)
    }

    /// Validate ranges that would otherwise produce meaningless results.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !(0.0..=1.0).contains(&self.historical_success_rate) {
            return Err(AnalysisError::invalid(format!(
                "historical_success_rate must be in [0, 1], got {}",
                self.historical_success_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.recommendation_threshold) {
            return Err(AnalysisError::invalid(format!(
                "recommendation_threshold must be in [0, 1], got {}",
                self.recommendation_threshold
            )));
        }
        if self.eigenvector_tolerance <= 0.0 || !self.eigenvector_tolerance.is_finite() {
            return Err(AnalysisError::invalid(
                "eigenvector_tolerance must be a positive number",
            ));
        }
        if self.payment_amounts.iter().any(|&a| a == 0) {
            return Err(AnalysisError::invalid("payment_amounts must all be positive"));
        }
        Ok(())
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(4)
}
