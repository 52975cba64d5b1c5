use crate::core::node::NodeId;
use serde::{Deserialize, Serialize};

/// A payment channel between two nodes, as delivered by the data-acquisition
/// layer.
///
/// Amounts are signed so that malformed upstream data (negative capacity or
/// balance) can be represented and rejected when a snapshot is built.
/// Missing balances are estimated at snapshot build time.
///
/// # Examples
///
/// ```
/// use dazflow_engine::core::channel::ChannelRecord;
///
/// let channel = ChannelRecord::new("chan-1", "02aa", "03bb", 1_000_000)
///     .with_balances(600_000, 400_000)
///     .with_fee_rates(100, 250);
///
/// assert_eq!(channel.capacity, 1_000_000);
/// assert!(channel.active);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub channel_id: String,
    #[serde(alias = "node1_pubkey")]
    pub node1_pub: NodeId,
    #[serde(alias = "node2_pubkey")]
    pub node2_pub: NodeId,
    /// Total channel capacity in satoshis.
    pub capacity: i64,
    /// Balance spendable by node1 towards node2.
    #[serde(default)]
    pub node1_balance: Option<i64>,
    /// Balance spendable by node2 towards node1.
    #[serde(default)]
    pub node2_balance: Option<i64>,
    /// Fee rate charged by node1 for forwarding (ppm).
    #[serde(default)]
    pub node1_fee_rate: Option<u32>,
    /// Fee rate charged by node2 for forwarding (ppm).
    #[serde(default)]
    pub node2_fee_rate: Option<u32>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ChannelRecord {
    pub fn new(
        channel_id: impl Into<String>,
        node1_pub: impl Into<NodeId>,
        node2_pub: impl Into<NodeId>,
        capacity: i64,
    ) -> Self {
        Self {
            channel_id: channel_id.into(),
            node1_pub: node1_pub.into(),
            node2_pub: node2_pub.into(),
            capacity,
            node1_balance: None,
            node2_balance: None,
            node1_fee_rate: None,
            node2_fee_rate: None,
            active: true,
        }
    }

    /// Set both directional balances.
    pub fn with_balances(mut self, node1_balance: i64, node2_balance: i64) -> Self {
        self.node1_balance = Some(node1_balance);
        self.node2_balance = Some(node2_balance);
        self
    }

    /// Set both directional fee rates (ppm).
    pub fn with_fee_rates(mut self, node1_fee_rate: u32, node2_fee_rate: u32) -> Self {
        self.node1_fee_rate = Some(node1_fee_rate);
        self.node2_fee_rate = Some(node2_fee_rate);
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }
}

/// A validated channel with resolved balances, owned by a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub channel_id: String,
    pub node1: NodeId,
    pub node2: NodeId,
    pub capacity: u64,
    pub node1_balance: u64,
    pub node2_balance: u64,
    pub node1_fee_rate: u32,
    pub node2_fee_rate: u32,
    pub active: bool,
}

impl Channel {
    /// Balance on `node`'s side and on the peer's side, in that order.
    pub fn balances_for(&self, node: &NodeId) -> Option<(u64, u64)> {
        if &self.node1 == node {
            Some((self.node1_balance, self.node2_balance))
        } else if &self.node2 == node {
            Some((self.node2_balance, self.node1_balance))
        } else {
            None
        }
    }

    pub fn peer_of(&self, node: &NodeId) -> Option<&NodeId> {
        if &self.node1 == node {
            Some(&self.node2)
        } else if &self.node2 == node {
            Some(&self.node1)
        } else {
            None
        }
    }
}
