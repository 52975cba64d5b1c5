use crate::core::channel::{Channel, ChannelRecord};
use crate::core::config::{AnalysisConfig, BalancePolicy};
use crate::core::error::{AnalysisError, Diagnostic};
use crate::core::node::{NodeId, NodeRecord};
use log::{debug, warn};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{HashMap, HashSet};

/// Largest accepted channel capacity: the 21M BTC supply in satoshis.
pub const MAX_CAPACITY_SATS: i64 = 21_000_000 * 100_000_000;

/// Immutable graph view of a network snapshot.
///
/// Holds two petgraph representations sharing the same node indices:
///
/// - `topology`: undirected, one edge per connected node pair, weight = sum
///   of channel capacities. Used by the centrality and topology analyzers.
/// - `liquidity`: directed, weight = balance spendable in that direction,
///   summed over active channels. Every edge has a reverse edge (possibly
///   with zero weight). Used by max-flow.
///
/// A snapshot is never mutated after [`GraphSnapshot::build`]; it can be
/// shared freely across threads.
///
/// # Examples
///
/// ```
/// use dazflow_engine::prelude::*;
///
/// let nodes = vec![NodeRecord::new("A", "alice"), NodeRecord::new("B", "bob")];
/// let channels = vec![
///     ChannelRecord::new("c1", "A", "B", 1_000_000).with_balances(500_000, 500_000),
/// ];
///
/// let snapshot = GraphSnapshot::build(nodes, channels).unwrap();
/// assert_eq!(snapshot.node_count(), 2);
/// assert_eq!(snapshot.channel_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    nodes: Vec<NodeRecord>,
    index: HashMap<NodeId, NodeIndex>,
    channels: Vec<Channel>,
    /// Channel positions per node, indexed by `NodeIndex::index()`.
    node_channels: Vec<Vec<usize>>,
    topology: UnGraph<NodeId, u64>,
    liquidity: DiGraph<NodeId, u64>,
    diagnostics: Vec<Diagnostic>,
}

impl GraphSnapshot {
    /// Build a snapshot with the default configuration.
    pub fn build(
        nodes: Vec<NodeRecord>,
        channels: Vec<ChannelRecord>,
    ) -> Result<Self, AnalysisError> {
        Self::build_with(nodes, channels, &AnalysisConfig::default())
    }

    /// Build a snapshot, validating every channel against the node list.
    pub fn build_with(
        nodes: Vec<NodeRecord>,
        channels: Vec<ChannelRecord>,
        config: &AnalysisConfig,
    ) -> Result<Self, AnalysisError> {
        let mut topology: UnGraph<NodeId, u64> = UnGraph::with_capacity(nodes.len(), channels.len());
        let mut liquidity = DiGraph::with_capacity(nodes.len(), channels.len() * 2);
        let mut index = HashMap::with_capacity(nodes.len());

        for node in &nodes {
            if index.contains_key(&node.pubkey) {
                return Err(AnalysisError::invalid(format!(
                    "duplicate node pubkey {}",
                    node.pubkey
                )));
            }
            let idx = topology.add_node(node.pubkey.clone());
            let didx = liquidity.add_node(node.pubkey.clone());
            debug_assert_eq!(idx, didx);
            index.insert(node.pubkey.clone(), idx);
        }

        let mut resolved = Vec::with_capacity(channels.len());
        let mut node_channels = vec![Vec::new(); nodes.len()];
        let mut seen_ids = HashSet::with_capacity(channels.len());
        let mut pair_edges: HashMap<(NodeIndex, NodeIndex), EdgeIndex> = HashMap::new();
        let mut arc_edges: HashMap<(NodeIndex, NodeIndex), EdgeIndex> = HashMap::new();
        let mut diagnostics = Vec::new();

        for record in channels {
            if !seen_ids.insert(record.channel_id.clone()) {
                return Err(AnalysisError::invalid(format!(
                    "duplicate channel id {}",
                    record.channel_id
                )));
            }
            let a = *index.get(&record.node1_pub).ok_or_else(|| {
                AnalysisError::invalid(format!(
                    "channel {} references unknown node {}",
                    record.channel_id, record.node1_pub
                ))
            })?;
            let b = *index.get(&record.node2_pub).ok_or_else(|| {
                AnalysisError::invalid(format!(
                    "channel {} references unknown node {}",
                    record.channel_id, record.node2_pub
                ))
            })?;
            if a == b {
                return Err(AnalysisError::invalid(format!(
                    "channel {} connects node {} to itself",
                    record.channel_id, record.node1_pub
                )));
            }
            if record.capacity < 0 {
                return Err(AnalysisError::invalid(format!(
                    "channel {} has negative capacity {}",
                    record.channel_id, record.capacity
                )));
            }
            if record.capacity > MAX_CAPACITY_SATS {
                return Err(AnalysisError::invalid(format!(
                    "channel {} capacity {} exceeds the bitcoin supply",
                    record.channel_id, record.capacity
                )));
            }
            if record.capacity == 0 {
                debug!("skipping zero-capacity channel {}", record.channel_id);
                diagnostics.push(Diagnostic::ZeroCapacityChannel {
                    channel_id: record.channel_id,
                });
                continue;
            }

            let (node1_balance, node2_balance, fell_back) = resolve_balances(&record, config)?;
            if fell_back {
                diagnostics.push(Diagnostic::BalanceFallback {
                    channel_id: record.channel_id.clone(),
                });
            }

            let capacity = record.capacity as u64;
            let key = if a < b { (a, b) } else { (b, a) };
            match pair_edges.get(&key) {
                Some(&e) => topology[e] = topology[e].saturating_add(capacity),
                None => {
                    let e = topology.add_edge(key.0, key.1, capacity);
                    pair_edges.insert(key, e);
                }
            }

            if record.active {
                add_arc(&mut liquidity, &mut arc_edges, a, b, node1_balance);
                add_arc(&mut liquidity, &mut arc_edges, b, a, node2_balance);
            }

            let position = resolved.len();
            node_channels[a.index()].push(position);
            node_channels[b.index()].push(position);
            resolved.push(Channel {
                channel_id: record.channel_id,
                node1: record.node1_pub,
                node2: record.node2_pub,
                capacity,
                node1_balance,
                node2_balance,
                node1_fee_rate: record.node1_fee_rate.unwrap_or(0),
                node2_fee_rate: record.node2_fee_rate.unwrap_or(0),
                active: record.active,
            });
        }

        debug!(
            "built snapshot: {} nodes, {} channels, {} node pairs",
            nodes.len(),
            resolved.len(),
            topology.edge_count()
        );

        Ok(Self {
            nodes,
            index,
            channels: resolved,
            node_channels,
            topology,
            liquidity,
            diagnostics,
        })
    }

    // --- Accessors ---

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of channels retained (zero-capacity channels excluded).
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of distinct connected node pairs.
    pub fn pair_count(&self) -> usize {
        self.topology.edge_count()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.index.contains_key(node)
    }

    pub fn node_index(&self, node: &NodeId) -> Option<NodeIndex> {
        self.index.get(node).copied()
    }

    /// Like [`GraphSnapshot::node_index`] but fails with `NodeNotFound`.
    pub fn require(&self, node: &NodeId) -> Result<NodeIndex, AnalysisError> {
        self.node_index(node)
            .ok_or_else(|| AnalysisError::not_found(node))
    }

    pub fn node_id(&self, idx: NodeIndex) -> &NodeId {
        &self.topology[idx]
    }

    pub fn node(&self, idx: NodeIndex) -> &NodeRecord {
        &self.nodes[idx.index()]
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channels with `node` as an endpoint, in input order.
    pub fn channels_of(&self, idx: NodeIndex) -> impl Iterator<Item = &Channel> + '_ {
        self.node_channels[idx.index()]
            .iter()
            .map(move |&pos| &self.channels[pos])
    }

    pub fn topology(&self) -> &UnGraph<NodeId, u64> {
        &self.topology
    }

    pub fn liquidity(&self) -> &DiGraph<NodeId, u64> {
        &self.liquidity
    }

    /// Events recorded while building (balance fallbacks, skipped channels).
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Number of distinct neighbors in the topology graph.
    pub fn degree(&self, idx: NodeIndex) -> usize {
        self.topology.edges(idx).count()
    }

    /// Sum of channel capacities incident to `idx`.
    pub fn weighted_degree(&self, idx: NodeIndex) -> u64 {
        self.topology
            .edges(idx)
            .fold(0u64, |acc, e| acc.saturating_add(*e.weight()))
    }

    /// Sum of directed balances `idx` can send.
    pub fn outbound_capacity(&self, idx: NodeIndex) -> u64 {
        self.liquidity
            .edges_directed(idx, Direction::Outgoing)
            .fold(0u64, |acc, e| acc.saturating_add(*e.weight()))
    }

    /// Sum of directed balances `idx` can receive.
    pub fn inbound_capacity(&self, idx: NodeIndex) -> u64 {
        self.liquidity
            .edges_directed(idx, Direction::Incoming)
            .fold(0u64, |acc, e| acc.saturating_add(*e.weight()))
    }

    /// Directed balance available from `from` to `to`.
    pub fn arc_capacity(&self, from: NodeIndex, to: NodeIndex) -> u64 {
        self.liquidity
            .find_edge(from, to)
            .map(|e| self.liquidity[e])
            .unwrap_or(0)
    }

    /// Undirected adjacency lists (by node position), sorted for
    /// deterministic traversal order.
    pub fn adjacency(&self) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); self.node_count()];
        for edge in self.topology.edge_references() {
            let (a, b) = (edge.source().index(), edge.target().index());
            adj[a].push(b);
            adj[b].push(a);
        }
        for list in &mut adj {
            list.sort_unstable();
        }
        adj
    }

    /// The `k` highest-degree nodes, ties broken by pubkey.
    pub fn top_nodes_by_degree(&self, k: usize) -> Vec<NodeIndex> {
        let mut ranked: Vec<NodeIndex> = self.topology.node_indices().collect();
        ranked.sort_by(|&a, &b| {
            self.degree(b)
                .cmp(&self.degree(a))
                .then_with(|| self.node_id(a).cmp(self.node_id(b)))
        });
        ranked.truncate(k);
        ranked
    }
}

fn add_arc(
    graph: &mut DiGraph<NodeId, u64>,
    arcs: &mut HashMap<(NodeIndex, NodeIndex), EdgeIndex>,
    from: NodeIndex,
    to: NodeIndex,
    amount: u64,
) {
    match arcs.get(&(from, to)) {
        Some(&e) => graph[e] = graph[e].saturating_add(amount),
        None => {
            let e = graph.add_edge(from, to, amount);
            arcs.insert((from, to), e);
        }
    }
}

/// Resolve the directional balances of a channel.
///
/// Returns `(node1_balance, node2_balance, fell_back)`; the two balances
/// never sum to more than the capacity. A combined overshoot of at most
/// `balance_tolerance_sats` is scaled down to fit, and any single side above
/// the capacity goes through `balance_policy`. Both cases are logged and
/// flagged as a fallback.
fn resolve_balances(
    record: &ChannelRecord,
    config: &AnalysisConfig,
) -> Result<(u64, u64, bool), AnalysisError> {
    let capacity = record.capacity as u64;
    for balance in [record.node1_balance, record.node2_balance].into_iter().flatten() {
        if balance < 0 {
            return Err(AnalysisError::invalid(format!(
                "channel {} has negative balance {}",
                record.channel_id, balance
            )));
        }
    }

    let (b1, b2) = match (record.node1_balance, record.node2_balance) {
        (None, None) => return Ok((capacity / 2, capacity - capacity / 2, false)),
        (Some(b1), None) => {
            let b1 = b1 as u64;
            (b1, capacity.saturating_sub(b1))
        }
        (None, Some(b2)) => {
            let b2 = b2 as u64;
            (capacity.saturating_sub(b2), b2)
        }
        (Some(b1), Some(b2)) => (b1 as u64, b2 as u64),
    };

    let total = b1.saturating_add(b2);
    if total <= capacity {
        return Ok((b1, b2, false));
    }

    let excess = total - capacity;
    if b1 <= capacity && b2 <= capacity && excess <= config.balance_tolerance_sats {
        warn!(
            "channel {}: balances {} + {} exceed capacity {} by {} sats, scaling to fit",
            record.channel_id, b1, b2, capacity, excess
        );
        let (s1, s2) = scale_to_capacity(b1, b2, capacity);
        return Ok((s1, s2, true));
    }

    match config.balance_policy {
        BalancePolicy::Reject => Err(AnalysisError::invalid(format!(
            "channel {} balances {} + {} exceed capacity {}",
            record.channel_id, b1, b2, capacity
        ))),
        BalancePolicy::SplitEvenly => {
            warn!(
                "channel {}: balances {} + {} exceed capacity {}, assuming capacity/2",
                record.channel_id, b1, b2, capacity
            );
            Ok((capacity / 2, capacity - capacity / 2, true))
        }
        BalancePolicy::Scale => {
            warn!(
                "channel {}: balances {} + {} exceed capacity {}, scaling down",
                record.channel_id, b1, b2, capacity
            );
            let (s1, s2) = scale_to_capacity(b1, b2, capacity);
            Ok((s1, s2, true))
        }
    }
}

/// Shrink `(b1, b2)` proportionally so they sum to `capacity`. `b1 + b2`
/// must exceed `capacity`.
fn scale_to_capacity(b1: u64, b2: u64, capacity: u64) -> (u64, u64) {
    let total = b1 as u128 + b2 as u128;
    let scaled1 = ((b1 as u128 * capacity as u128) / total) as u64;
    (scaled1, capacity - scaled1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(ids: &[&str]) -> Vec<NodeRecord> {
        ids.iter().map(|id| NodeRecord::new(*id, *id)).collect()
    }

    #[test]
    fn test_build_basic() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B", "C"]),
            vec![
                ChannelRecord::new("c1", "A", "B", 1000).with_balances(600, 400),
                ChannelRecord::new("c2", "B", "C", 2000),
            ],
        )
        .unwrap();

        let a = snapshot.node_index(&NodeId::new("A")).unwrap();
        let b = snapshot.node_index(&NodeId::new("B")).unwrap();
        let c = snapshot.node_index(&NodeId::new("C")).unwrap();

        assert_eq!(snapshot.arc_capacity(a, b), 600);
        assert_eq!(snapshot.arc_capacity(b, a), 400);
        assert_eq!(snapshot.arc_capacity(b, c), 1000);
        assert_eq!(snapshot.arc_capacity(c, b), 1000);
        assert_eq!(snapshot.degree(b), 2);
        assert_eq!(snapshot.weighted_degree(b), 3000);
    }

    #[test]
    fn test_every_arc_has_reverse() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B", "C"]),
            vec![
                ChannelRecord::new("c1", "A", "B", 1000).with_balances(1000, 0),
                ChannelRecord::new("c2", "C", "B", 500).with_balances(0, 500),
            ],
        )
        .unwrap();

        let g = snapshot.liquidity();
        for edge in g.edge_references() {
            assert!(g.find_edge(edge.target(), edge.source()).is_some());
        }
    }

    #[test]
    fn test_parallel_channels_aggregate() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![
                ChannelRecord::new("c1", "A", "B", 1000).with_balances(500, 500),
                ChannelRecord::new("c2", "B", "A", 3000).with_balances(1000, 2000),
            ],
        )
        .unwrap();

        let a = snapshot.node_index(&NodeId::new("A")).unwrap();
        let b = snapshot.node_index(&NodeId::new("B")).unwrap();
        assert_eq!(snapshot.pair_count(), 1);
        assert_eq!(snapshot.weighted_degree(a), 4000);
        assert_eq!(snapshot.arc_capacity(a, b), 2500);
        assert_eq!(snapshot.arc_capacity(b, a), 1500);
        assert_eq!(snapshot.channels_of(a).count(), 2);
    }

    #[test]
    fn test_unknown_node_rejected() {
        let err = GraphSnapshot::build(
            nodes(&["A"]),
            vec![ChannelRecord::new("c1", "A", "Z", 1000)],
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));
    }

    #[test]
    fn test_negative_capacity_rejected() {
        let err = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![ChannelRecord::new("c1", "A", "B", -5)],
        )
        .unwrap_err();
        assert!(err.to_string().contains("negative capacity"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        assert!(GraphSnapshot::build(nodes(&["A", "A"]), vec![]).is_err());
        assert!(GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![
                ChannelRecord::new("c1", "A", "B", 10),
                ChannelRecord::new("c1", "A", "B", 10),
            ],
        )
        .is_err());
    }

    #[test]
    fn test_zero_capacity_skipped() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![ChannelRecord::new("c1", "A", "B", 0)],
        )
        .unwrap();
        assert_eq!(snapshot.channel_count(), 0);
        assert_eq!(snapshot.pair_count(), 0);
        assert_eq!(
            snapshot.diagnostics(),
            &[Diagnostic::ZeroCapacityChannel {
                channel_id: "c1".to_string()
            }]
        );
    }

    #[test]
    fn test_missing_balances_default_to_half() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![ChannelRecord::new("c1", "A", "B", 1001)],
        )
        .unwrap();
        let ch = &snapshot.channels()[0];
        assert_eq!(ch.node1_balance, 500);
        assert_eq!(ch.node2_balance, 501);
    }

    #[test]
    fn test_balance_overflow_policies() {
        let channel =
            || ChannelRecord::new("c1", "A", "B", 100_000).with_balances(90_000, 90_000);

        let split = GraphSnapshot::build(nodes(&["A", "B"]), vec![channel()]).unwrap();
        assert_eq!(split.channels()[0].node1_balance, 50_000);
        assert_eq!(split.diagnostics().len(), 1);

        let scale_config = AnalysisConfig {
            balance_policy: BalancePolicy::Scale,
            ..Default::default()
        };
        let scaled =
            GraphSnapshot::build_with(nodes(&["A", "B"]), vec![channel()], &scale_config).unwrap();
        assert_eq!(scaled.channels()[0].node1_balance, 50_000);
        assert_eq!(scaled.channels()[0].node2_balance, 50_000);

        let reject_config = AnalysisConfig {
            balance_policy: BalancePolicy::Reject,
            ..Default::default()
        };
        assert!(GraphSnapshot::build_with(nodes(&["A", "B"]), vec![channel()], &reject_config)
            .is_err());
    }

    #[test]
    fn test_small_overflow_scaled_to_capacity() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![ChannelRecord::new("c1", "A", "B", 1000).with_balances(600, 500)],
        )
        .unwrap();
        let ch = &snapshot.channels()[0];
        assert_eq!(ch.node1_balance, 545);
        assert_eq!(ch.node2_balance, 455);
        assert_eq!(
            snapshot.diagnostics(),
            &[Diagnostic::BalanceFallback {
                channel_id: "c1".to_string()
            }]
        );
    }

    #[test]
    fn test_one_side_above_capacity_uses_policy() {
        let channel = || ChannelRecord::new("c1", "A", "B", 1000).with_balances(1500, 400);

        let split = GraphSnapshot::build(nodes(&["A", "B"]), vec![channel()]).unwrap();
        let ch = &split.channels()[0];
        assert_eq!((ch.node1_balance, ch.node2_balance), (500, 500));
        assert_eq!(split.diagnostics().len(), 1);

        let scale_config = AnalysisConfig {
            balance_policy: BalancePolicy::Scale,
            ..Default::default()
        };
        let scaled =
            GraphSnapshot::build_with(nodes(&["A", "B"]), vec![channel()], &scale_config).unwrap();
        let ch = &scaled.channels()[0];
        assert_eq!((ch.node1_balance, ch.node2_balance), (789, 211));

        let reject_config = AnalysisConfig {
            balance_policy: BalancePolicy::Reject,
            ..Default::default()
        };
        assert!(GraphSnapshot::build_with(nodes(&["A", "B"]), vec![channel()], &reject_config)
            .is_err());

        // A lone balance above capacity is not clipped either.
        let lone = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![ChannelRecord {
                node2_balance: None,
                ..channel()
            }],
        )
        .unwrap();
        assert_eq!(lone.channels()[0].node1_balance, 500);
        assert_eq!(lone.diagnostics().len(), 1);
    }

    #[test]
    fn test_balances_never_exceed_capacity() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B", "C"]),
            vec![
                ChannelRecord::new("c1", "A", "B", 1000).with_balances(1500, 400),
                ChannelRecord::new("c2", "B", "C", 1000).with_balances(999, 2),
                ChannelRecord::new("c3", "A", "C", 1000).with_balances(300, 300),
            ],
        )
        .unwrap();
        for ch in snapshot.channels() {
            assert!(ch.node1_balance + ch.node2_balance <= ch.capacity);
        }
        assert_eq!(snapshot.diagnostics().len(), 2);
    }

    #[test]
    fn test_capacity_above_supply_rejected() {
        let err = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![ChannelRecord::new("c1", "A", "B", i64::MAX)],
        )
        .unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidInput { .. }));

        let channels = (0..3)
            .map(|i| ChannelRecord::new(format!("c{}", i), "A", "B", MAX_CAPACITY_SATS))
            .collect();
        let snapshot = GraphSnapshot::build(nodes(&["A", "B"]), channels).unwrap();
        let a = snapshot.node_index(&NodeId::new("A")).unwrap();
        assert_eq!(snapshot.weighted_degree(a), 3 * MAX_CAPACITY_SATS as u64);
    }

    #[test]
    fn test_inactive_channel_excluded_from_liquidity() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B"]),
            vec![ChannelRecord::new("c1", "A", "B", 1000).with_active(false)],
        )
        .unwrap();
        assert_eq!(snapshot.pair_count(), 1);
        assert_eq!(snapshot.liquidity().edge_count(), 0);
    }

    #[test]
    fn test_top_nodes_by_degree() {
        let snapshot = GraphSnapshot::build(
            nodes(&["A", "B", "C", "D"]),
            vec![
                ChannelRecord::new("c1", "A", "B", 10),
                ChannelRecord::new("c2", "A", "C", 10),
                ChannelRecord::new("c3", "A", "D", 10),
                ChannelRecord::new("c4", "B", "C", 10),
            ],
        )
        .unwrap();
        let top: Vec<&str> = snapshot
            .top_nodes_by_degree(2)
            .into_iter()
            .map(|i| snapshot.node_id(i).as_str())
            .collect();
        assert_eq!(top, vec!["A", "B"]);
    }
}
