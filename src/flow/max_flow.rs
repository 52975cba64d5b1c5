use crate::core::error::AnalysisError;
use crate::core::node::NodeId;
use crate::graph::snapshot::GraphSnapshot;
use log::debug;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};

/// A directed arc of the liquidity graph that carries (or bounds) flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: NodeId,
    pub to: NodeId,
    /// Directional balance available on the arc.
    pub capacity: u64,
    /// Net flow routed over the arc in the max-flow solution.
    pub flow: u64,
}

/// One source→target path of a flow decomposition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowPath {
    pub nodes: Vec<NodeId>,
    pub amount: u64,
    /// `hop_capacities[i]` is the capacity of `nodes[i] -> nodes[i + 1]`.
    pub hop_capacities: Vec<u64>,
}

impl FlowPath {
    pub fn hop_count(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }
}

/// Result of a max-flow query between two nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    pub source: NodeId,
    pub target: NodeId,
    pub amount: Option<u64>,
    pub max_flow_value: u64,
    /// In `[0, 1]`.
    pub success_probability: f64,
    /// Decomposed paths, largest amount first.
    pub flow_paths: Vec<FlowPath>,
    /// Saturated arcs of the minimum cut.
    pub bottleneck_edges: Vec<FlowEdge>,
}

/// Aggregated usage of one arc across all paths of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUtilization {
    pub from: NodeId,
    pub to: NodeId,
    pub flow: u64,
    pub capacity: u64,
    /// `flow / capacity`, in `[0, 1]`.
    pub utilization: f64,
    /// Number of decomposed paths crossing the arc.
    pub path_count: usize,
}

/// Max-flow based payment analysis over the liquidity graph.
pub struct FlowAnalyzer;

impl FlowAnalyzer {
    /// Maximum flow from `source` to `target` (Edmonds–Karp).
    ///
    /// With `amount`, the success probability is `min(1, max_flow / amount)`;
    /// without it, 1 when any flow exists and 0 otherwise. An unreachable
    /// target is not an error: the result simply carries zero flow.
    ///
    /// # Examples
    ///
    /// ```
    /// use dazflow_engine::prelude::*;
    ///
    /// let snapshot = GraphSnapshot::build(
    ///     vec![NodeRecord::new("A", ""), NodeRecord::new("B", "")],
    ///     vec![ChannelRecord::new("c1", "A", "B", 1_000_000).with_balances(500_000, 500_000)],
    /// )
    /// .unwrap();
    ///
    /// let result = FlowAnalyzer::max_flow(&snapshot, &"A".into(), &"B".into(), Some(1_000_000))
    ///     .unwrap();
    /// assert_eq!(result.max_flow_value, 500_000);
    /// assert_eq!(result.success_probability, 0.5);
    /// ```
    pub fn max_flow(
        snapshot: &GraphSnapshot,
        source: &NodeId,
        target: &NodeId,
        amount: Option<u64>,
    ) -> Result<FlowResult, AnalysisError> {
        let s = snapshot.require(source)?.index();
        let t = snapshot.require(target)?.index();
        if s == t {
            return Err(AnalysisError::invalid(format!(
                "source and target are the same node {}",
                source
            )));
        }

        let mut network = ResidualNetwork::from_snapshot(snapshot);
        let max_flow_value = network.edmonds_karp(s, t);
        debug!("max flow {} -> {} = {}", source, target, max_flow_value);

        let flow_paths = network
            .decompose(s, t)
            .into_iter()
            .map(|(path, amount)| FlowPath {
                hop_capacities: path
                    .windows(2)
                    .map(|hop| network.capacity_between(hop[0], hop[1]))
                    .collect(),
                nodes: path.iter().map(|&v| network.node_ids[v].clone()).collect(),
                amount,
            })
            .collect();

        let bottleneck_edges = network
            .min_cut(s)
            .into_iter()
            .map(|arc| FlowEdge {
                from: network.node_ids[network.tail[arc]].clone(),
                to: network.node_ids[network.head[arc]].clone(),
                capacity: network.original[arc],
                flow: network.original[arc] - network.residual[arc],
            })
            .collect();

        Ok(FlowResult {
            source: source.clone(),
            target: target.clone(),
            amount,
            max_flow_value,
            success_probability: success_probability(max_flow_value, amount),
            flow_paths,
            bottleneck_edges,
        })
    }

    /// Success probability for each amount, keyed by amount.
    ///
    /// Non-increasing in the amount for a fixed snapshot.
    pub fn payment_probability_curve(
        snapshot: &GraphSnapshot,
        source: &NodeId,
        target: &NodeId,
        amounts: &[u64],
    ) -> Result<BTreeMap<u64, f64>, AnalysisError> {
        // The flow value itself does not depend on the amount being tested.
        let flow = Self::max_flow(snapshot, source, target, None)?.max_flow_value;
        Ok(amounts
            .iter()
            .map(|&amount| (amount, success_probability(flow, Some(amount))))
            .collect())
    }

    /// Rank arcs by the flow routed over them across all decomposed paths.
    pub fn bottleneck_analysis(result: &FlowResult, top_n: usize) -> Vec<EdgeUtilization> {
        let mut usage: HashMap<(&NodeId, &NodeId), (u64, u64, usize)> = HashMap::new();
        for path in &result.flow_paths {
            for (hop, &capacity) in path.nodes.windows(2).zip(&path.hop_capacities) {
                let entry = usage.entry((&hop[0], &hop[1])).or_insert((0, capacity, 0));
                entry.0 += path.amount;
                entry.2 += 1;
            }
        }

        let mut ranked: Vec<EdgeUtilization> = usage
            .into_iter()
            .map(|((from, to), (flow, capacity, path_count))| EdgeUtilization {
                from: from.clone(),
                to: to.clone(),
                flow,
                capacity,
                utilization: ratio(flow, capacity),
                path_count,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.flow
                .cmp(&a.flow)
                .then_with(|| b.utilization.total_cmp(&a.utilization))
                .then_with(|| a.from.cmp(&b.from))
                .then_with(|| a.to.cmp(&b.to))
        });
        ranked.truncate(top_n);
        ranked
    }
}

/// `min(1, flow / amount)`, or a 0/1 reachability indicator without an amount.
pub fn success_probability(flow: u64, amount: Option<u64>) -> f64 {
    match amount {
        Some(0) => 1.0,
        Some(amount) => (flow as f64 / amount as f64).min(1.0),
        None if flow > 0 => 1.0,
        None => 0.0,
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        (part as f64 / whole as f64).clamp(0.0, 1.0)
    }
}

/// Paired-arc residual network: arc `2k` is a liquidity edge, arc `2k + 1`
/// its zero-capacity residual twin, so `arc ^ 1` is always the reverse.
struct ResidualNetwork {
    node_ids: Vec<NodeId>,
    adjacency: Vec<Vec<usize>>,
    tail: Vec<usize>,
    head: Vec<usize>,
    residual: Vec<u64>,
    original: Vec<u64>,
}

impl ResidualNetwork {
    fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let graph = snapshot.liquidity();
        let n = graph.node_count();
        let mut network = Self {
            node_ids: graph.node_indices().map(|i| graph[i].clone()).collect(),
            adjacency: vec![Vec::new(); n],
            tail: Vec::new(),
            head: Vec::new(),
            residual: Vec::new(),
            original: Vec::new(),
        };
        for edge in graph.edge_references() {
            if *edge.weight() > 0 {
                network.add_arc(edge.source().index(), edge.target().index(), *edge.weight());
            }
        }
        for arcs in &mut network.adjacency {
            arcs.sort_by_key(|&arc| network.head[arc]);
        }
        network
    }

    fn add_arc(&mut self, from: usize, to: usize, capacity: u64) {
        let id = self.tail.len();
        self.tail.extend([from, to]);
        self.head.extend([to, from]);
        self.residual.extend([capacity, 0]);
        self.original.extend([capacity, 0]);
        self.adjacency[from].push(id);
        self.adjacency[to].push(id + 1);
    }

    /// Arc id used to reach each node by BFS over positive residual arcs.
    fn bfs(&self, s: usize, usable: impl Fn(usize) -> bool) -> Vec<Option<usize>> {
        let mut via = vec![None; self.adjacency.len()];
        let mut seen = vec![false; self.adjacency.len()];
        seen[s] = true;
        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            for &arc in &self.adjacency[v] {
                let w = self.head[arc];
                if !seen[w] && usable(arc) {
                    seen[w] = true;
                    via[w] = Some(arc);
                    queue.push_back(w);
                }
            }
        }
        via
    }

    fn edmonds_karp(&mut self, s: usize, t: usize) -> u64 {
        let mut total = 0u64;
        loop {
            let via = self.bfs(s, |arc| self.residual[arc] > 0);
            if via[t].is_none() {
                break;
            }

            let mut bottleneck = u64::MAX;
            let mut v = t;
            while let Some(arc) = via[v] {
                bottleneck = bottleneck.min(self.residual[arc]);
                v = self.tail[arc];
            }

            let mut v = t;
            while let Some(arc) = via[v] {
                self.residual[arc] -= bottleneck;
                self.residual[arc ^ 1] += bottleneck;
                v = self.tail[arc];
            }
            total += bottleneck;
        }
        total
    }

    /// Split the net arc flows into source→target paths, shortest first.
    ///
    /// Flow cycles carry no source→target value and are left out.
    fn decompose(&self, s: usize, t: usize) -> Vec<(Vec<usize>, u64)> {
        let arc_count = self.original.len();
        let mut net = vec![0u64; arc_count];
        let mut reverse_of: HashMap<(usize, usize), usize> = HashMap::new();
        for arc in (0..arc_count).step_by(2) {
            reverse_of.insert((self.tail[arc], self.head[arc]), arc);
        }
        for arc in (0..arc_count).step_by(2) {
            let forward = self.original[arc] - self.residual[arc];
            let backward = reverse_of
                .get(&(self.head[arc], self.tail[arc]))
                .map(|&rev| self.original[rev] - self.residual[rev])
                .unwrap_or(0);
            net[arc] = forward.saturating_sub(backward);
        }

        let mut paths = Vec::new();
        loop {
            let via = self.bfs(s, |arc| arc % 2 == 0 && net[arc] > 0);
            if via[t].is_none() {
                break;
            }
            let mut arcs = Vec::new();
            let mut v = t;
            while let Some(arc) = via[v] {
                arcs.push(arc);
                v = self.tail[arc];
            }
            arcs.reverse();

            let amount = arcs.iter().map(|&arc| net[arc]).min().unwrap_or(0);
            for &arc in &arcs {
                net[arc] -= amount;
            }
            let mut nodes = vec![s];
            nodes.extend(arcs.iter().map(|&arc| self.head[arc]));
            paths.push((nodes, amount));
        }

        paths.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.len().cmp(&b.0.len())));
        paths
    }

    /// Saturated liquidity arcs leaving the source side of the final residual.
    fn min_cut(&self, s: usize) -> Vec<usize> {
        let via = self.bfs(s, |arc| self.residual[arc] > 0);
        let source_side: Vec<bool> = (0..self.adjacency.len())
            .map(|v| v == s || via[v].is_some())
            .collect();
        (0..self.original.len())
            .step_by(2)
            .filter(|&arc| source_side[self.tail[arc]] && !source_side[self.head[arc]])
            .collect()
    }

    fn capacity_between(&self, from: usize, to: usize) -> u64 {
        self.adjacency[from]
            .iter()
            .find(|&&arc| arc % 2 == 0 && self.head[arc] == to)
            .map(|&arc| self.original[arc])
            .unwrap_or(0)
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

    fn id(s: &str) -> NodeId {
        NodeId::new(s)
    }

    #[test]
    fn test_single_channel_flow() {
        let snap = snapshot(
            &["A", "B"],
            vec![ChannelRecord::new("c1", "A", "B", 1_000_000).with_balances(500_000, 500_000)],
        );
        let result = FlowAnalyzer::max_flow(&snap, &id("A"), &id("B"), Some(500_000)).unwrap();
        assert_eq!(result.max_flow_value, 500_000);
        assert_relative_eq!(result.success_probability, 1.0);
        assert_eq!(result.flow_paths.len(), 1);
        assert_eq!(result.flow_paths[0].nodes, vec![id("A"), id("B")]);
        assert_eq!(result.bottleneck_edges.len(), 1);
        assert_eq!(result.bottleneck_edges[0].flow, 500_000);
    }

    #[test]
    fn test_parallel_routes_sum() {
        // A -> B -> D and A -> C -> D
        let snap = snapshot(
            &["A", "B", "C", "D"],
            vec![
                ChannelRecord::new("ab", "A", "B", 200).with_balances(100, 100),
                ChannelRecord::new("bd", "B", "D", 200).with_balances(80, 120),
                ChannelRecord::new("ac", "A", "C", 200).with_balances(60, 140),
                ChannelRecord::new("cd", "C", "D", 200).with_balances(150, 50),
            ],
        );
        let result = FlowAnalyzer::max_flow(&snap, &id("A"), &id("D"), None).unwrap();
        assert_eq!(result.max_flow_value, 140);
        assert_relative_eq!(result.success_probability, 1.0);

        let path_total: u64 = result.flow_paths.iter().map(|p| p.amount).sum();
        assert_eq!(path_total, 140);
        assert!(result.flow_paths.iter().all(|p| p.hop_count() == 2));
        let cut_total: u64 = result.bottleneck_edges.iter().map(|e| e.capacity).sum();
        assert_eq!(cut_total, 140);
    }

    #[test]
    fn test_direction_matters() {
        let snap = snapshot(
            &["A", "B"],
            vec![ChannelRecord::new("c1", "A", "B", 1000).with_balances(1000, 0)],
        );
        let forward = FlowAnalyzer::max_flow(&snap, &id("A"), &id("B"), None).unwrap();
        let backward = FlowAnalyzer::max_flow(&snap, &id("B"), &id("A"), None).unwrap();
        assert_eq!(forward.max_flow_value, 1000);
        assert_eq!(backward.max_flow_value, 0);
        assert_eq!(backward.success_probability, 0.0);
        assert!(backward.flow_paths.is_empty());
    }

    #[test]
    fn test_no_path_is_zero_not_error() {
        let snap = snapshot(
            &["A", "B", "C"],
            vec![ChannelRecord::new("c1", "A", "B", 1000)],
        );
        let result = FlowAnalyzer::max_flow(&snap, &id("A"), &id("C"), Some(10)).unwrap();
        assert_eq!(result.max_flow_value, 0);
        assert_eq!(result.success_probability, 0.0);
    }

    #[test]
    fn test_unknown_endpoint() {
        let snap = snapshot(&["A"], vec![]);
        let err = FlowAnalyzer::max_flow(&snap, &id("A"), &id("Z"), None).unwrap_err();
        assert_eq!(err, AnalysisError::not_found(&id("Z")));
    }

    #[test]
    fn test_same_endpoints_rejected() {
        let snap = snapshot(&["A"], vec![]);
        assert!(FlowAnalyzer::max_flow(&snap, &id("A"), &id("A"), None).is_err());
    }

    #[test]
    fn test_probability_curve_non_increasing() {
        let snap = snapshot(
            &["A", "B", "C"],
            vec![
                ChannelRecord::new("ab", "A", "B", 100_000).with_balances(70_000, 30_000),
                ChannelRecord::new("bc", "B", "C", 100_000).with_balances(40_000, 60_000),
            ],
        );
        let curve = FlowAnalyzer::payment_probability_curve(
            &snap,
            &id("A"),
            &id("C"),
            &[1_000, 10_000, 40_000, 80_000, 160_000],
        )
        .unwrap();
        let values: Vec<f64> = curve.values().copied().collect();
        assert_eq!(values, vec![1.0, 1.0, 1.0, 0.5, 0.25]);
    }

    #[test]
    fn test_bottleneck_analysis_ranks_shared_hop() {
        // Two routes share the final hop X -> D.
        let snap = snapshot(
            &["A", "B", "C", "X", "D"],
            vec![
                ChannelRecord::new("ab", "A", "B", 100).with_balances(50, 50),
                ChannelRecord::new("ac", "A", "C", 100).with_balances(50, 50),
                ChannelRecord::new("bx", "B", "X", 100).with_balances(50, 50),
                ChannelRecord::new("cx", "C", "X", 100).with_balances(50, 50),
                ChannelRecord::new("xd", "X", "D", 200).with_balances(100, 100),
            ],
        );
        let result = FlowAnalyzer::max_flow(&snap, &id("A"), &id("D"), None).unwrap();
        assert_eq!(result.max_flow_value, 100);

        let ranked = FlowAnalyzer::bottleneck_analysis(&result, 1);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].from, id("X"));
        assert_eq!(ranked[0].to, id("D"));
        assert_eq!(ranked[0].flow, 100);
        assert_relative_eq!(ranked[0].utilization, 1.0);
        assert_eq!(ranked[0].path_count, 2);
    }

    #[test]
    fn test_success_probability_edge_cases() {
        assert_eq!(success_probability(0, Some(0)), 1.0);
        assert_eq!(success_probability(10, Some(5)), 1.0);
        assert_eq!(success_probability(0, None), 0.0);
        assert_eq!(success_probability(1, None), 1.0);
    }
}
