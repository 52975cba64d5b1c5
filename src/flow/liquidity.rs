use crate::core::error::AnalysisError;
use crate::core::node::NodeId;
use crate::flow::max_flow::FlowAnalyzer;
use crate::graph::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Max-flow from a node to one of the network's top hubs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubReachability {
    pub hub: NodeId,
    pub max_flow: u64,
}

/// Liquidity position of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiquidityProfile {
    pub node: NodeId,
    pub outbound_liquidity: u64,
    pub inbound_liquidity: u64,
    /// `outbound / (outbound + inbound)`, 0 without liquidity.
    pub liquidity_ratio: f64,
    pub channel_count: usize,
    pub active_channel_count: usize,
    pub reachability_to_top_hubs: Vec<HubReachability>,
    /// Share of the top hubs reachable with non-zero flow.
    pub hub_reachability_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RebalanceDirection {
    /// Pull liquidity to the local side (local balance too low).
    IncreaseOutbound,
    /// Push liquidity to the remote side (local balance too high).
    IncreaseInbound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
        }
    }
}

/// A suggested rebalance with one peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebalanceRecommendation {
    pub peer: NodeId,
    pub peer_alias: String,
    pub direction: RebalanceDirection,
    /// Sats to move to reach `target_ratio`.
    pub amount: u64,
    pub current_ratio: f64,
    pub target_ratio: f64,
    pub priority: Priority,
}

/// Outbound-ratio thresholds and targets for rebalancing.
const LOW_RATIO: f64 = 0.2;
const HIGH_RATIO: f64 = 0.8;
const CRITICAL_RATIO: f64 = 0.1;
const LOW_TARGET: f64 = 0.3;
const HIGH_TARGET: f64 = 0.7;

impl FlowAnalyzer {
    /// Outbound/inbound liquidity of `node` and its max-flow reach to the
    /// `hub_count` highest-degree nodes.
    ///
    /// A node without channels yields an all-zero profile.
    pub fn liquidity_profile(
        snapshot: &GraphSnapshot,
        node: &NodeId,
        hub_count: usize,
    ) -> Result<LiquidityProfile, AnalysisError> {
        let idx = snapshot.require(node)?;
        let outbound = snapshot.outbound_capacity(idx);
        let inbound = snapshot.inbound_capacity(idx);
        let channel_count = snapshot.channels_of(idx).count();
        let active_channel_count = snapshot.channels_of(idx).filter(|c| c.active).count();

        let mut reachability = Vec::new();
        if outbound > 0 {
            let hubs: Vec<_> = snapshot
                .top_nodes_by_degree(hub_count + 1)
                .into_iter()
                .filter(|&h| h != idx)
                .take(hub_count)
                .collect();
            for hub in hubs {
                let hub_id = snapshot.node_id(hub);
                let flow = Self::max_flow(snapshot, node, hub_id, None)?;
                reachability.push(HubReachability {
                    hub: hub_id.clone(),
                    max_flow: flow.max_flow_value,
                });
            }
        }

        let hub_reachability_score = if reachability.is_empty() {
            0.0
        } else {
            reachability.iter().filter(|r| r.max_flow > 0).count() as f64
                / reachability.len() as f64
        };

        Ok(LiquidityProfile {
            node: node.clone(),
            outbound_liquidity: outbound,
            inbound_liquidity: inbound,
            liquidity_ratio: outbound_ratio(outbound, inbound),
            channel_count,
            active_channel_count,
            reachability_to_top_hubs: reachability,
            hub_reachability_score,
        })
    }

    /// Per-peer rebalancing suggestions, high priority first, then by amount.
    ///
    /// Balances are aggregated over all channels with the same peer.
    pub fn rebalancing_recommendations(
        snapshot: &GraphSnapshot,
        node: &NodeId,
    ) -> Result<Vec<RebalanceRecommendation>, AnalysisError> {
        let idx = snapshot.require(node)?;

        let mut per_peer: BTreeMap<&NodeId, (u64, u64)> = BTreeMap::new();
        for channel in snapshot.channels_of(idx) {
            if let (Some(peer), Some((local, remote))) =
                (channel.peer_of(node), channel.balances_for(node))
            {
                let entry = per_peer.entry(peer).or_insert((0, 0));
                entry.0 += local;
                entry.1 += remote;
            }
        }

        let mut recommendations: Vec<RebalanceRecommendation> = per_peer
            .into_iter()
            .filter_map(|(peer, (local, remote))| {
                let total = local + remote;
                if total == 0 {
                    return None;
                }
                let ratio = local as f64 / total as f64;
                let (direction, target_ratio, amount) = if ratio < LOW_RATIO {
                    let target = (total as f64 * LOW_TARGET).round() as u64;
                    (
                        RebalanceDirection::IncreaseOutbound,
                        LOW_TARGET,
                        target.saturating_sub(local),
                    )
                } else if ratio > HIGH_RATIO {
                    let target = (total as f64 * HIGH_TARGET).round() as u64;
                    (
                        RebalanceDirection::IncreaseInbound,
                        HIGH_TARGET,
                        local.saturating_sub(target),
                    )
                } else {
                    return None;
                };
                let peer_alias = snapshot
                    .node_index(peer)
                    .map(|p| snapshot.node(p).display_name())
                    .unwrap_or_default();
                Some(RebalanceRecommendation {
                    peer: peer.clone(),
                    peer_alias,
                    direction,
                    amount,
                    current_ratio: ratio,
                    target_ratio,
                    priority: if ratio < CRITICAL_RATIO {
                        Priority::High
                    } else {
                        Priority::Medium
                    },
                })
            })
            .collect();

        recommendations.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then_with(|| b.amount.cmp(&a.amount))
                .then_with(|| a.peer.cmp(&b.peer))
        });
        Ok(recommendations)
    }
}

fn outbound_ratio(outbound: u64, inbound: u64) -> f64 {
    let total = outbound + inbound;
    if total == 0 {
        0.0
    } else {
        outbound as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::ChannelRecord;
    use crate::core::node::NodeRecord;
    use approx::assert_relative_eq;

    fn snapshot(ids: &[&str], channels: Vec<ChannelRecord>) -> GraphSnapshot {
        let nodes = ids.iter().map(|id| NodeRecord::new(*id, *id)).collect();
        GraphSnapshot::build(nodes, channels).unwrap()
    }

    #[test]
    fn test_liquidity_profile_basic() {
        let snap = snapshot(
            &["A", "B", "C"],
            vec![
                ChannelRecord::new("ab", "A", "B", 1000).with_balances(800, 200),
                ChannelRecord::new("bc", "B", "C", 1000).with_balances(500, 500),
            ],
        );
        let profile = FlowAnalyzer::liquidity_profile(&snap, &"A".into(), 2).unwrap();
        assert_eq!(profile.outbound_liquidity, 800);
        assert_eq!(profile.inbound_liquidity, 200);
        assert_relative_eq!(profile.liquidity_ratio, 0.8);
        assert_eq!(profile.channel_count, 1);

        // Hubs by degree: B (2), then A/C tie broken by pubkey -> C after excluding A.
        let hubs: Vec<&str> = profile
            .reachability_to_top_hubs
            .iter()
            .map(|r| r.hub.as_str())
            .collect();
        assert_eq!(hubs, vec!["B", "C"]);
        assert_eq!(profile.reachability_to_top_hubs[0].max_flow, 800);
        assert_eq!(profile.reachability_to_top_hubs[1].max_flow, 500);
        assert_relative_eq!(profile.hub_reachability_score, 1.0);
    }

    #[test]
    fn test_isolated_node_profile_is_zero() {
        let snap = snapshot(
            &["A", "B", "Z"],
            vec![ChannelRecord::new("ab", "A", "B", 1000)],
        );
        let profile = FlowAnalyzer::liquidity_profile(&snap, &"Z".into(), 5).unwrap();
        assert_eq!(profile.outbound_liquidity, 0);
        assert_eq!(profile.inbound_liquidity, 0);
        assert_eq!(profile.liquidity_ratio, 0.0);
        assert_eq!(profile.channel_count, 0);
        assert!(profile.reachability_to_top_hubs.is_empty());
        assert_eq!(profile.hub_reachability_score, 0.0);
    }

    #[test]
    fn test_rebalancing_thresholds() {
        let snap = snapshot(
            &["N", "P1", "P2", "P3", "P4"],
            vec![
                // ratio 0.05 -> high, increase outbound to 30%
                ChannelRecord::new("c1", "N", "P1", 1000).with_balances(50, 950),
                // ratio 0.15 -> medium, increase outbound
                ChannelRecord::new("c2", "N", "P2", 1000).with_balances(150, 850),
                // ratio 0.9 -> medium, increase inbound to 70%
                ChannelRecord::new("c3", "N", "P3", 2000).with_balances(1800, 200),
                // balanced -> no recommendation
                ChannelRecord::new("c4", "N", "P4", 1000).with_balances(500, 500),
            ],
        );
        let recs = FlowAnalyzer::rebalancing_recommendations(&snap, &"N".into()).unwrap();
        assert_eq!(recs.len(), 3);

        assert_eq!(recs[0].peer.as_str(), "P1");
        assert_eq!(recs[0].priority, Priority::High);
        assert_eq!(recs[0].direction, RebalanceDirection::IncreaseOutbound);
        assert_eq!(recs[0].amount, 250);

        assert_eq!(recs[1].peer.as_str(), "P3");
        assert_eq!(recs[1].direction, RebalanceDirection::IncreaseInbound);
        assert_eq!(recs[1].amount, 400);
        assert_eq!(recs[1].priority, Priority::Medium);

        assert_eq!(recs[2].peer.as_str(), "P2");
        assert_eq!(recs[2].amount, 150);
    }

    #[test]
    fn test_rebalancing_isolated_node_empty() {
        let snap = snapshot(&["A"], vec![]);
        let recs = FlowAnalyzer::rebalancing_recommendations(&snap, &"A".into()).unwrap();
        assert!(recs.is_empty());
    }
}
