use crate::core::channel::Channel;
use crate::core::node::NodeId;
use crate::graph::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Imbalance above which a channel is flagged `liquidity_imbalance`.
pub const IMBALANCE_THRESHOLD: f64 = 0.5;
/// Imbalance above which severity is `high` (exclusive).
pub const HIGH_SEVERITY_THRESHOLD: f64 = 0.8;
/// Share of capacity below which a side counts as depleted.
pub const LOW_SIDE_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelIssue {
    LiquidityImbalance,
    LowOutbound,
    LowInbound,
}

impl fmt::Display for ChannelIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelIssue::LiquidityImbalance => write!(f, "liquidity_imbalance"),
            ChannelIssue::LowOutbound => write!(f, "low_outbound"),
            ChannelIssue::LowInbound => write!(f, "low_inbound"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    High,
    Medium,
}

/// A channel of the analysed node with at least one liquidity issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub channel_id: String,
    pub peer: NodeId,
    pub peer_alias: String,
    pub capacity: u64,
    pub local_balance: u64,
    pub remote_balance: u64,
    /// `|local - remote| / (local + remote)`, in `[0, 1]`.
    pub imbalance_ratio: f64,
    pub issues: Vec<ChannelIssue>,
    pub severity: Severity,
}

/// `|local - remote| / (local + remote)`; 0 for an empty channel.
pub fn imbalance_ratio(local: u64, remote: u64) -> f64 {
    let total = local + remote;
    if total == 0 {
        0.0
    } else {
        local.abs_diff(remote) as f64 / total as f64
    }
}

/// Check one channel from `node`'s side. Returns `None` when the channel has
/// no issue.
pub fn inspect_channel(
    snapshot: &GraphSnapshot,
    channel: &Channel,
    node: &NodeId,
) -> Option<Bottleneck> {
    let (local, remote) = channel.balances_for(node)?;
    let peer = channel.peer_of(node)?;
    let ratio = imbalance_ratio(local, remote);
    let floor = channel.capacity as f64 * LOW_SIDE_THRESHOLD;

    let mut issues = Vec::new();
    if ratio > IMBALANCE_THRESHOLD {
        issues.push(ChannelIssue::LiquidityImbalance);
    }
    if (local as f64) < floor {
        issues.push(ChannelIssue::LowOutbound);
    }
    if (remote as f64) < floor {
        issues.push(ChannelIssue::LowInbound);
    }
    if issues.is_empty() {
        return None;
    }

    let peer_alias = snapshot
        .node_index(peer)
        .map(|idx| snapshot.node(idx).display_name())
        .unwrap_or_default();
    Some(Bottleneck {
        channel_id: channel.channel_id.clone(),
        peer: peer.clone(),
        peer_alias,
        capacity: channel.capacity,
        local_balance: local,
        remote_balance: remote,
        imbalance_ratio: ratio,
        issues,
        severity: if ratio > HIGH_SEVERITY_THRESHOLD {
            Severity::High
        } else {
            Severity::Medium
        },
    })
}

/// Every problematic channel of `node`, most imbalanced first.
pub fn scan_bottlenecks(snapshot: &GraphSnapshot, node: &NodeId) -> Vec<Bottleneck> {
    let Some(idx) = snapshot.node_index(node) else {
        return Vec::new();
    };
    let mut found: Vec<Bottleneck> = snapshot
        .channels_of(idx)
        .filter_map(|channel| inspect_channel(snapshot, channel, node))
        .collect();
    found.sort_by(|a, b| {
        b.imbalance_ratio
            .total_cmp(&a.imbalance_ratio)
            .then_with(|| a.channel_id.cmp(&b.channel_id))
    });
    found
}
