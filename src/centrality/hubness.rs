use crate::centrality::measures::{sanitize, CentralityAnalyzer, CentralityScores};
use crate::core::config::AnalysisConfig;
use crate::core::error::Diagnostic;
use crate::core::node::NodeId;
use crate::graph::snapshot::GraphSnapshot;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Weights of the hubness components, in the order
/// degree, weighted degree, betweenness, closeness, eigenvector.
pub const HUBNESS_WEIGHTS: [f64; 5] = [0.3, 0.3, 0.2, 0.1, 0.1];

/// Composite hub score of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubScore {
    pub node: NodeId,
    pub alias: String,
    /// In `[0, 1]`.
    pub score: f64,
    pub degree: usize,
    pub weighted_degree: u64,
    pub normalized_degree: f64,
    pub normalized_capacity: f64,
    pub betweenness: f64,
    pub closeness: f64,
    pub eigenvector: f64,
}

/// Ranked hubs plus the concentration of hubness across the network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubnessReport {
    /// Highest score first, at most `top_n` entries.
    pub hubs: Vec<HubScore>,
    /// Gini coefficient of all nodes' scores, in `[0, 1]`.
    pub gini_coefficient: f64,
    pub mean_score: f64,
    pub node_count: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl CentralityAnalyzer {
    /// Rank the `top_n` most hub-like nodes.
    pub fn hubness(
        snapshot: &GraphSnapshot,
        top_n: usize,
        config: &AnalysisConfig,
    ) -> HubnessReport {
        let scores = Self::scores(snapshot, config);
        Self::hubness_from_scores(snapshot, &scores, top_n, config)
    }

    /// Hubness from precomputed centrality scores.
    pub fn hubness_from_scores(
        snapshot: &GraphSnapshot,
        scores: &CentralityScores,
        top_n: usize,
        config: &AnalysisConfig,
    ) -> HubnessReport {
        let mut all: Vec<HubScore> = (0..snapshot.node_count())
            .map(|i| hub_score(snapshot, scores, NodeIndex::new(i), config))
            .collect();

        let values: Vec<f64> = all.iter().map(|h| h.score).collect();
        let gini_coefficient = gini(&values);
        let mean_score = if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        };

        all.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.node.cmp(&b.node))
        });
        all.truncate(top_n);

        HubnessReport {
            hubs: all,
            gini_coefficient,
            mean_score,
            node_count: snapshot.node_count(),
            diagnostics: scores.diagnostics.clone(),
        }
    }
}

fn hub_score(
    snapshot: &GraphSnapshot,
    scores: &CentralityScores,
    idx: NodeIndex,
    config: &AnalysisConfig,
) -> HubScore {
    let i = idx.index();
    let degree = snapshot.degree(idx);
    let weighted_degree = snapshot.weighted_degree(idx);
    let normalized_degree = capped_ratio(degree as f64, config.degree_cap as f64);
    let normalized_capacity = capped_ratio(weighted_degree as f64, config.capacity_cap_sats as f64);

    let components = [
        normalized_degree,
        normalized_capacity,
        scores.betweenness[i],
        scores.closeness[i],
        scores.eigenvector[i],
    ];
    let score = components
        .iter()
        .zip(HUBNESS_WEIGHTS)
        .map(|(c, w)| c * w)
        .sum::<f64>();

    let node = snapshot.node(idx);
    HubScore {
        node: node.pubkey.clone(),
        alias: node.alias.clone(),
        score: sanitize(score),
        degree,
        weighted_degree,
        normalized_degree,
        normalized_capacity,
        betweenness: scores.betweenness[i],
        closeness: scores.closeness[i],
        eigenvector: scores.eigenvector[i],
    }
}

fn capped_ratio(value: f64, cap: f64) -> f64 {
    if cap <= 0.0 {
        0.0
    } else {
        (value / cap).min(1.0)
    }
}

/// Gini coefficient of non-negative values, in `[0, 1]`; 0 for an empty or
/// all-zero input.
///
/// # Examples
///
/// ```
/// use dazflow_engine::centrality::hubness::gini;
///
/// assert_eq!(gini(&[1.0, 1.0, 1.0]), 0.0);
/// assert!(gini(&[0.0, 0.0, 0.0, 1.0]) > 0.7);
/// ```
pub fn gini(values: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = values
        .iter()
        .map(|v| if v.is_finite() { v.max(0.0) } else { 0.0 })
        .collect();
    let total: f64 = sorted.iter().sum();
    if sorted.is_empty() || total <= 0.0 {
        return 0.0;
    }
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len() as f64;
    let weighted: f64 = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64 + 1.0) * v)
        .sum();
    sanitize(2.0 * weighted / (n * total) - (n + 1.0) / n)
}
