use crate::centrality::measures::{betweenness_centrality, sample_pivots, sanitize};
use crate::core::config::AnalysisConfig;
use crate::core::error::{AnalysisError, Diagnostic};
use crate::core::node::NodeId;
use crate::dazflow::bottleneck::{imbalance_ratio, scan_bottlenecks, Bottleneck};
use crate::dazflow::reliability::{CurveFactors, ReliabilityCurve};
use crate::flow::max_flow::{success_probability, FlowAnalyzer};
use crate::graph::snapshot::GraphSnapshot;
use chrono::{DateTime, Utc};
use log::{debug, info};
use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Weight of balance symmetry in liquidity efficiency; utilization gets the rest.
pub const SYMMETRY_WEIGHT: f64 = 0.7;

/// Caller overrides for one DazFlow analysis. Unset fields fall back to
/// `AnalysisConfig`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DazFlowRequest {
    pub node_id: NodeId,
    /// Destinations for the max-flow probes; the top hubs by degree when unset.
    pub targets: Option<Vec<NodeId>>,
    pub payment_amounts: Option<Vec<u64>>,
    pub historical_success_rate: Option<f64>,
    /// Precomputed betweenness of the node, in `[0, 1]`.
    pub betweenness: Option<f64>,
}

impl DazFlowRequest {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            ..Default::default()
        }
    }

    pub fn with_targets(mut self, targets: Vec<NodeId>) -> Self {
        self.targets = Some(targets);
        self
    }

    pub fn with_payment_amounts(mut self, amounts: Vec<u64>) -> Self {
        self.payment_amounts = Some(amounts);
        self
    }

    pub fn with_historical_success_rate(mut self, rate: f64) -> Self {
        self.historical_success_rate = Some(rate);
        self
    }

    pub fn with_betweenness(mut self, betweenness: f64) -> Self {
        self.betweenness = Some(betweenness);
        self
    }
}

/// Headline numbers of a DazFlow analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DazFlowAnalysis {
    pub node_id: NodeId,
    pub timestamp: DateTime<Utc>,
    /// Ascending.
    pub payment_amounts: Vec<u64>,
    /// Same length as `payment_amounts`.
    pub success_probabilities: Vec<f64>,
    /// Amount-weighted mean of `success_probabilities`.
    pub dazflow_index: f64,
    pub bottleneck_channels: Vec<String>,
    pub liquidity_efficiency: f64,
    pub network_centrality: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    Complete,
    /// Finished, but some input was estimated or a computation fell back.
    Degraded,
    /// The node has no channels; every score is zero.
    NoChannels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DazFlowReport {
    pub status: AnalysisStatus,
    pub analysis: DazFlowAnalysis,
    pub reliability_curve: ReliabilityCurve,
    pub bottlenecks: Vec<Bottleneck>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Composite liquidity-health scoring of a single node.
pub struct DazFlowIndex;

impl DazFlowIndex {
    /// Analyse `request.node_id`, stamped with the current time.
    ///
    /// # Examples
    ///
    /// ```
    /// use dazflow_engine::prelude::*;
    /// use dazflow_engine::dazflow::{AnalysisStatus, DazFlowRequest};
    ///
    /// let snapshot = GraphSnapshot::build(
    ///     vec![NodeRecord::new("A", ""), NodeRecord::new("B", ""), NodeRecord::new("Z", "")],
    ///     vec![ChannelRecord::new("c1", "A", "B", 1_000_000)],
    /// )
    /// .unwrap();
    ///
    /// let config = AnalysisConfig::default();
    /// let report = DazFlowIndex::analyze(&snapshot, &DazFlowRequest::new("A"), &config).unwrap();
    /// assert!((0.0..=1.0).contains(&report.analysis.dazflow_index));
    ///
    /// let lonely = DazFlowIndex::analyze(&snapshot, &DazFlowRequest::new("Z"), &config).unwrap();
    /// assert_eq!(lonely.status, AnalysisStatus::NoChannels);
    /// assert_eq!(lonely.analysis.dazflow_index, 0.0);
    /// ```
    pub fn analyze(
        snapshot: &GraphSnapshot,
        request: &DazFlowRequest,
        config: &AnalysisConfig,
    ) -> Result<DazFlowReport, AnalysisError> {
        Self::analyze_at(snapshot, request, config, Utc::now())
    }

    /// Like [`DazFlowIndex::analyze`] with an explicit timestamp.
    pub fn analyze_at(
        snapshot: &GraphSnapshot,
        request: &DazFlowRequest,
        config: &AnalysisConfig,
        timestamp: DateTime<Utc>,
    ) -> Result<DazFlowReport, AnalysisError> {
        let node = &request.node_id;
        let idx = snapshot.require(node)?;
        let amounts = payment_ladder(request, config)?;
        let historical_success_rate = request
            .historical_success_rate
            .unwrap_or(config.historical_success_rate);
        if !(0.0..=1.0).contains(&historical_success_rate) {
            return Err(AnalysisError::invalid(format!(
                "historical success rate must be in [0, 1], got {}",
                historical_success_rate
            )));
        }
        if let Some(b) = request.betweenness {
            if !(0.0..=1.0).contains(&b) {
                return Err(AnalysisError::invalid(format!(
                    "betweenness must be in [0, 1], got {}",
                    b
                )));
            }
        }

        let channel_count = snapshot.channels_of(idx).count();
        if channel_count == 0 {
            info!("dazflow: {} has no channels", node);
            return Ok(Self::no_channels(node, amounts, timestamp));
        }

        let mut diagnostics: Vec<Diagnostic> = own_channel_diagnostics(snapshot, idx);
        let stats = ChannelStats::collect(snapshot, idx);

        let network_centrality = match request.betweenness {
            Some(b) => b,
            None => {
                let (b, sampled) = node_betweenness(snapshot, idx, config);
                diagnostics.push(Diagnostic::BetweennessComputed { sampled });
                b
            }
        };

        let flows = target_flows(snapshot, node, idx, request.targets.as_deref(), config)?;
        let outbound = snapshot.outbound_capacity(idx);
        let base = |amount: u64| -> f64 {
            if flows.is_empty() {
                success_probability(outbound, Some(amount))
            } else {
                flows
                    .iter()
                    .map(|&f| success_probability(f, Some(amount)))
                    .sum::<f64>()
                    / flows.len() as f64
            }
        };

        let factors = CurveFactors {
            balance_symmetry: stats.balance_symmetry,
            outbound_liquidity: outbound,
            active_channel_ratio: stats.active_ratio,
            betweenness: network_centrality,
            historical_success_rate,
            channel_count,
        };
        let reliability_curve = ReliabilityCurve::build(
            &amounts,
            base,
            &factors,
            config.confidence_z,
            config.recommendation_threshold,
        );
        let bottlenecks = scan_bottlenecks(snapshot, node);
        let dazflow_index = reliability_curve.weighted_index();
        debug!(
            "dazflow: {} index {:.4} over {} amounts, {} bottlenecks",
            node,
            dazflow_index,
            amounts.len(),
            bottlenecks.len()
        );

        let status = if diagnostics
            .iter()
            .any(|d| !matches!(d, Diagnostic::BetweennessComputed { .. }))
        {
            AnalysisStatus::Degraded
        } else {
            AnalysisStatus::Complete
        };

        Ok(DazFlowReport {
            status,
            analysis: DazFlowAnalysis {
                node_id: node.clone(),
                timestamp,
                payment_amounts: amounts,
                success_probabilities: reliability_curve.probabilities.clone(),
                dazflow_index,
                bottleneck_channels: bottlenecks.iter().map(|b| b.channel_id.clone()).collect(),
                liquidity_efficiency: sanitize(
                    SYMMETRY_WEIGHT * stats.balance_symmetry
                        + (1.0 - SYMMETRY_WEIGHT) * stats.utilization,
                ),
                network_centrality: sanitize(network_centrality),
            },
            reliability_curve,
            bottlenecks,
            diagnostics,
        })
    }

    /// Sentinel for a node without channels: the requested ladder with zero
    /// probability everywhere.
    fn no_channels(node: &NodeId, amounts: Vec<u64>, timestamp: DateTime<Utc>) -> DazFlowReport {
        let zeros = vec![0.0; amounts.len()];
        DazFlowReport {
            status: AnalysisStatus::NoChannels,
            analysis: DazFlowAnalysis {
                node_id: node.clone(),
                timestamp,
                payment_amounts: amounts.clone(),
                success_probabilities: zeros.clone(),
                dazflow_index: 0.0,
                bottleneck_channels: Vec::new(),
                liquidity_efficiency: 0.0,
                network_centrality: 0.0,
            },
            reliability_curve: ReliabilityCurve {
                confidence_intervals: vec![Default::default(); amounts.len()],
                amounts,
                probabilities: zeros,
                recommended_amounts: Vec::new(),
            },
            bottlenecks: Vec::new(),
            diagnostics: Vec::new(),
        }
    }
}

/// Sorted, de-duplicated amount ladder; zero amounts are rejected.
fn payment_ladder(
    request: &DazFlowRequest,
    config: &AnalysisConfig,
) -> Result<Vec<u64>, AnalysisError> {
    let mut amounts = request
        .payment_amounts
        .clone()
        .unwrap_or_else(|| config.payment_amounts.clone());
    if amounts.is_empty() {
        return Err(AnalysisError::invalid("payment amount ladder is empty"));
    }
    if amounts.contains(&0) {
        return Err(AnalysisError::invalid("payment amounts must be positive"));
    }
    amounts.sort_unstable();
    amounts.dedup();
    Ok(amounts)
}

/// Aggregate balance shape over every channel of one node.
struct ChannelStats {
    /// `1 -` capacity-weighted mean imbalance ratio.
    balance_symmetry: f64,
    /// Known balances over total capacity.
    utilization: f64,
    active_ratio: f64,
}

impl ChannelStats {
    fn collect(snapshot: &GraphSnapshot, idx: NodeIndex) -> Self {
        let node = snapshot.node_id(idx);
        let mut capacity = 0u64;
        let mut balances = 0u64;
        let mut weighted_imbalance = 0.0;
        let mut count = 0usize;
        let mut active = 0usize;
        for channel in snapshot.channels_of(idx) {
            let Some((local, remote)) = channel.balances_for(node) else {
                continue;
            };
            count += 1;
            if channel.active {
                active += 1;
            }
            capacity += channel.capacity;
            balances += local + remote;
            weighted_imbalance += channel.capacity as f64 * imbalance_ratio(local, remote);
        }
        if capacity == 0 {
            return Self {
                balance_symmetry: 0.0,
                utilization: 0.0,
                active_ratio: 0.0,
            };
        }
        Self {
            balance_symmetry: sanitize(1.0 - weighted_imbalance / capacity as f64),
            utilization: sanitize(balances as f64 / capacity as f64),
            active_ratio: active as f64 / count as f64,
        }
    }
}

/// Betweenness of one node from the same seeded pivots the full centrality
/// report uses. Also returns whether the pivots were a sample.
fn node_betweenness(
    snapshot: &GraphSnapshot,
    idx: NodeIndex,
    config: &AnalysisConfig,
) -> (f64, bool) {
    let adj = snapshot.adjacency();
    let mut rng = StdRng::seed_from_u64(config.sampling_seed);
    let pivots = sample_pivots(adj.len(), config.betweenness_sample_cap, &mut rng);
    let sampled = pivots.len() < adj.len();
    (betweenness_centrality(&adj, &pivots)[idx.index()], sampled)
}

/// Max-flow from the node to each probe target, skipping the node itself.
fn target_flows(
    snapshot: &GraphSnapshot,
    node: &NodeId,
    idx: NodeIndex,
    targets: Option<&[NodeId]>,
    config: &AnalysisConfig,
) -> Result<Vec<u64>, AnalysisError> {
    let targets: Vec<NodeId> = match targets {
        Some(ids) => {
            let mut seen = HashSet::new();
            let mut unique = Vec::new();
            for id in ids {
                snapshot.require(id)?;
                if id != node && seen.insert(id) {
                    unique.push(id.clone());
                }
            }
            unique
        }
        None => snapshot
            .top_nodes_by_degree(config.hub_count + 1)
            .into_iter()
            .filter(|&h| h != idx)
            .take(config.hub_count)
            .map(|h| snapshot.node_id(h).clone())
            .collect(),
    };

    targets
        .iter()
        .map(|t| FlowAnalyzer::max_flow(snapshot, node, t, None).map(|r| r.max_flow_value))
        .collect()
}

/// Balance fallbacks recorded at build time for this node's channels.
fn own_channel_diagnostics(snapshot: &GraphSnapshot, idx: NodeIndex) -> Vec<Diagnostic> {
    let ids: HashSet<&str> = snapshot
        .channels_of(idx)
        .map(|c| c.channel_id.as_str())
        .collect();
    snapshot
        .diagnostics()
        .iter()
        .filter(|d| {
            matches!(d, Diagnostic::BalanceFallback { channel_id }
                if ids.contains(channel_id.as_str()))
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::ChannelRecord;
    use crate::core::node::NodeRecord;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    /// N routes between L and R; Z is isolated.
    fn snapshot() -> GraphSnapshot {
        let nodes = ["L", "N", "R", "Z"]
            .iter()
            .map(|id| NodeRecord::new(*id, format!("{id}-alias")))
            .collect();
        GraphSnapshot::build(
            nodes,
            vec![
                ChannelRecord::new("ln", "L", "N", 1_000_000).with_balances(500_000, 500_000),
                ChannelRecord::new("nr", "N", "R", 1_000_000).with_balances(900_000, 100_000),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_router_index_matches_weighted_curve() {
        let snap = snapshot();
        let request = DazFlowRequest::new("N");
        let report =
            DazFlowIndex::analyze_at(&snap, &request, &AnalysisConfig::default(), at()).unwrap();

        assert_eq!(report.status, AnalysisStatus::Complete);
        assert_eq!(report.analysis.timestamp, at());
        // N sits on the only L-R path: exact betweenness is 1.
        assert_relative_eq!(report.analysis.network_centrality, 1.0);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::BetweennessComputed { sampled: false }]
        );

        let curve = &report.reliability_curve;
        let amounts = &report.analysis.payment_amounts;
        let weighted: f64 = amounts
            .iter()
            .zip(&curve.probabilities)
            .map(|(&a, p)| a as f64 * p)
            .sum();
        let total: f64 = amounts.iter().map(|&a| a as f64).sum();
        assert_relative_eq!(report.analysis.dazflow_index, weighted / total, epsilon = 1e-12);
        assert_eq!(report.analysis.bottleneck_channels, vec!["nr".to_string()]);
    }

    #[test]
    fn test_factors_applied_to_small_amount() {
        let snap = snapshot();
        let request = DazFlowRequest::new("N")
            .with_targets(vec!["L".into(), "R".into()])
            .with_payment_amounts(vec![1_000])
            .with_betweenness(0.5);
        let report =
            DazFlowIndex::analyze_at(&snap, &request, &AnalysisConfig::default(), at()).unwrap();

        // Symmetry: imbalance 0 on ln and 0.8 on nr, equal capacity.
        let symmetry = 1.0 - 0.4;
        let expected = 1.0 * symmetry * 0.5 * 0.85;
        assert_relative_eq!(report.analysis.success_probabilities[0], expected, epsilon = 1e-12);
        assert_relative_eq!(report.analysis.dazflow_index, expected, epsilon = 1e-12);
        assert_relative_eq!(
            report.analysis.liquidity_efficiency,
            0.7 * symmetry + 0.3 * 1.0,
            epsilon = 1e-12
        );
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_no_channels_sentinel() {
        let report = DazFlowIndex::analyze_at(
            &snapshot(),
            &DazFlowRequest::new("Z"),
            &AnalysisConfig::default(),
            at(),
        )
        .unwrap();
        assert_eq!(report.status, AnalysisStatus::NoChannels);
        assert_eq!(report.analysis.dazflow_index, 0.0);
        assert_eq!(report.analysis.payment_amounts.len(), 5);
        assert!(report.analysis.success_probabilities.iter().all(|&p| p == 0.0));
        assert!(report.bottlenecks.is_empty());
    }

    #[test]
    fn test_ladder_sorted_and_validated() {
        let snap = snapshot();
        let config = AnalysisConfig::default();
        let request = DazFlowRequest::new("N").with_payment_amounts(vec![10_000, 1_000, 10_000]);
        let report = DazFlowIndex::analyze_at(&snap, &request, &config, at()).unwrap();
        assert_eq!(report.analysis.payment_amounts, vec![1_000, 10_000]);

        let zero = DazFlowRequest::new("N").with_payment_amounts(vec![0]);
        assert!(DazFlowIndex::analyze_at(&snap, &zero, &config, at()).is_err());

        let bad_rate = DazFlowRequest::new("N").with_historical_success_rate(1.5);
        assert!(DazFlowIndex::analyze_at(&snap, &bad_rate, &config, at()).is_err());
    }

    #[test]
    fn test_unknown_node_and_target() {
        let snap = snapshot();
        let config = AnalysisConfig::default();
        let err = DazFlowIndex::analyze_at(&snap, &DazFlowRequest::new("nope"), &config, at())
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NodeNotFound { .. }));

        let request = DazFlowRequest::new("N").with_targets(vec!["ghost".into()]);
        assert!(DazFlowIndex::analyze_at(&snap, &request, &config, at()).is_err());
    }

    #[test]
    fn test_balance_fallback_degrades_report() {
        let nodes = vec![NodeRecord::new("A", ""), NodeRecord::new("B", "")];
        let channels =
            vec![ChannelRecord::new("ab", "A", "B", 1_000).with_balances(900_000, 900_000)];
        let snap = GraphSnapshot::build(nodes, channels).unwrap();
        let report = DazFlowIndex::analyze_at(
            &snap,
            &DazFlowRequest::new("A").with_betweenness(0.0),
            &AnalysisConfig::default(),
            at(),
        )
        .unwrap();
        assert_eq!(report.status, AnalysisStatus::Degraded);
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::BalanceFallback {
                channel_id: "ab".to_string()
            }]
        );
    }
}
