//! Degree, betweenness, closeness and eigenvector centrality.
//!
//! All measures run on the undirected topology graph and count hops, not
//! capacity. Betweenness and closeness switch to pivot sampling once the
//! graph has more nodes than the configured cap; eigenvector centrality
//! degrades to all-zero scores when power iteration does not converge.
//!
//! # References
//!
//! - Brandes (2001). "A faster algorithm for betweenness centrality"
//! - Brandes & Pich (2007). "Centrality estimation in large networks"
//! - Wasserman & Faust (1994). closeness for disconnected graphs

use crate::core::config::AnalysisConfig;
use crate::core::error::{AnalysisError, Diagnostic};
use crate::core::node::NodeId;
use crate::graph::connectivity::{bfs_distances, UNREACHABLE};
use crate::graph::snapshot::GraphSnapshot;
use log::warn;
use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Centrality of one node; every value is in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeCentrality {
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
    pub eigenvector: f64,
}

/// Freeman centralization of the whole network per measure, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Centralization {
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
    pub eigenvector: f64,
}

/// Centrality scores for the queried node (or every node) plus
/// network-level centralization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentralityReport {
    pub nodes: BTreeMap<NodeId, NodeCentrality>,
    pub centralization: Centralization,
    /// Number of Brandes pivots used.
    pub betweenness_pivots: usize,
    /// Number of BFS pivots used for closeness.
    pub closeness_pivots: usize,
    /// True when either pivot set was a sample rather than every node.
    pub approximate: bool,
    pub eigenvector_converged: bool,
    pub diagnostics: Vec<Diagnostic>,
}

/// Raw per-node score vectors, indexed by node position.
#[derive(Debug, Clone, PartialEq)]
pub struct CentralityScores {
    pub degree: Vec<f64>,
    pub betweenness: Vec<f64>,
    pub closeness: Vec<f64>,
    pub eigenvector: Vec<f64>,
    pub betweenness_pivots: usize,
    pub closeness_pivots: usize,
    pub eigenvector_converged: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl CentralityScores {
    pub fn node(&self, i: usize) -> NodeCentrality {
        NodeCentrality {
            degree: self.degree[i],
            betweenness: self.betweenness[i],
            closeness: self.closeness[i],
            eigenvector: self.eigenvector[i],
        }
    }

    pub fn len(&self) -> usize {
        self.degree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.degree.is_empty()
    }

    pub fn centralization(&self) -> Centralization {
        let n = self.len() as f64;
        if self.len() < 3 {
            return Centralization::default();
        }
        let star_eigen_spread = (n - 1.0) * (0.5f64.sqrt() - (1.0 / (2.0 * (n - 1.0))).sqrt());
        Centralization {
            degree: freeman(&self.degree, n - 2.0),
            betweenness: freeman(&self.betweenness, n - 1.0),
            closeness: freeman(&self.closeness, (n - 1.0) * (n - 2.0) / (2.0 * n - 3.0)),
            eigenvector: freeman(&self.eigenvector, star_eigen_spread),
        }
    }
}

/// Structural centrality analysis over the topology graph.
pub struct CentralityAnalyzer;

impl CentralityAnalyzer {
    /// Centrality report for `node`, or for every node when `None`.
    pub fn centrality(
        snapshot: &GraphSnapshot,
        node: Option<&NodeId>,
        config: &AnalysisConfig,
    ) -> Result<CentralityReport, AnalysisError> {
        let selected = node.map(|id| snapshot.require(id)).transpose()?;
        let scores = Self::scores(snapshot, config);

        let nodes = match selected {
            Some(idx) => BTreeMap::from([(snapshot.node_id(idx).clone(), scores.node(idx.index()))]),
            None => (0..scores.len())
                .map(|i| (snapshot.node_id(NodeIndex::new(i)).clone(), scores.node(i)))
                .collect(),
        };

        let n = snapshot.node_count();
        Ok(CentralityReport {
            nodes,
            centralization: scores.centralization(),
            betweenness_pivots: scores.betweenness_pivots,
            closeness_pivots: scores.closeness_pivots,
            approximate: scores.betweenness_pivots < n || scores.closeness_pivots < n,
            eigenvector_converged: scores.eigenvector_converged,
            diagnostics: scores.diagnostics,
        })
    }

    /// Every centrality measure for every node.
    pub fn scores(snapshot: &GraphSnapshot, config: &AnalysisConfig) -> CentralityScores {
        let adj = snapshot.adjacency();
        let mut rng = StdRng::seed_from_u64(config.sampling_seed);
        let betweenness_pivots = sample_pivots(adj.len(), config.betweenness_sample_cap, &mut rng);
        let closeness_pivots = sample_pivots(adj.len(), config.closeness_sample_cap, &mut rng);

        let mut diagnostics = Vec::new();
        let (eigenvector, converged) = match eigenvector_centrality(
            &adj,
            config.eigenvector_max_iterations,
            config.eigenvector_tolerance,
        ) {
            Some(scores) => (scores, true),
            None => {
                warn!(
                    "eigenvector centrality did not converge in {} iterations, using zeros",
                    config.eigenvector_max_iterations
                );
                diagnostics.push(Diagnostic::EigenvectorNotConverged {
                    iterations: config.eigenvector_max_iterations,
                });
                (vec![0.0; adj.len()], false)
            }
        };

        CentralityScores {
            degree: degree_centrality(&adj),
            betweenness: betweenness_centrality(&adj, &betweenness_pivots),
            closeness: closeness_centrality(&adj, &closeness_pivots),
            eigenvector,
            betweenness_pivots: betweenness_pivots.len(),
            closeness_pivots: closeness_pivots.len(),
            eigenvector_converged: converged,
            diagnostics,
        }
    }
}

/// All nodes when `cap >= n`, otherwise a seeded sample of `cap` nodes.
pub(crate) fn sample_pivots(n: usize, cap: usize, rng: &mut StdRng) -> Vec<usize> {
    if cap >= n {
        return (0..n).collect();
    }
    let mut pivots = rand::seq::index::sample(rng, n, cap).into_vec();
    pivots.sort_unstable();
    pivots
}

/// Unique-neighbor count over `n - 1`.
pub fn degree_centrality(adj: &[Vec<usize>]) -> Vec<f64> {
    let n = adj.len();
    if n < 2 {
        return vec![0.0; n];
    }
    let norm = (n - 1) as f64;
    adj.iter().map(|nbrs| nbrs.len() as f64 / norm).collect()
}

/// Normalized betweenness from Brandes accumulation over `pivots`,
/// extrapolated by `n / pivots.len()` when sampled.
pub fn betweenness_centrality(adj: &[Vec<usize>], pivots: &[usize]) -> Vec<f64> {
    let n = adj.len();
    let mut betweenness = vec![0.0_f64; n];
    if n < 3 || pivots.is_empty() {
        return betweenness;
    }

    let mut sigma = vec![0.0_f64; n];
    let mut dist = vec![-1_i64; n];
    let mut delta = vec![0.0_f64; n];
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order = Vec::with_capacity(n);
    let mut queue = VecDeque::new();

    for &s in pivots {
        sigma.iter_mut().for_each(|x| *x = 0.0);
        dist.iter_mut().for_each(|x| *x = -1);
        delta.iter_mut().for_each(|x| *x = 0.0);
        predecessors.iter_mut().for_each(Vec::clear);
        order.clear();

        sigma[s] = 1.0;
        dist[s] = 0;
        queue.push_back(s);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            for &w in &adj[v] {
                if dist[w] < 0 {
                    dist[w] = dist[v] + 1;
                    queue.push_back(w);
                }
                if dist[w] == dist[v] + 1 {
                    sigma[w] += sigma[v];
                    predecessors[w].push(v);
                }
            }
        }

        for &w in order.iter().rev() {
            for &v in &predecessors[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                betweenness[w] += delta[w];
            }
        }
    }

    // Undirected pairs are seen from both ends; (n-1)(n-2) already accounts for it.
    let scale = n as f64 / pivots.len() as f64 / ((n - 1) * (n - 2)) as f64;
    for b in &mut betweenness {
        *b = sanitize(*b * scale);
    }
    betweenness
}

/// Wasserman–Faust closeness estimated from BFS runs out of `pivots`.
///
/// With every node as a pivot this is exact:
/// `(r / (n - 1)) * (r / Σd)` where `r` counts reachable nodes.
pub fn closeness_centrality(adj: &[Vec<usize>], pivots: &[usize]) -> Vec<f64> {
    let n = adj.len();
    let mut reached = vec![0usize; n];
    let mut total = vec![0u64; n];
    for &p in pivots {
        for (v, &d) in bfs_distances(adj, p).iter().enumerate() {
            if v != p && d != UNREACHABLE {
                reached[v] += 1;
                total[v] += d as u64;
            }
        }
    }

    let is_pivot = {
        let mut mask = vec![false; n];
        for &p in pivots {
            mask[p] = true;
        }
        mask
    };

    (0..n)
        .map(|v| {
            let others = pivots.len() - usize::from(is_pivot[v]);
            if reached[v] == 0 || others == 0 {
                return 0.0;
            }
            let reach_fraction = reached[v] as f64 / others as f64;
            sanitize(reach_fraction * reached[v] as f64 / total[v] as f64)
        })
        .collect()
}

/// Power iteration on `A + I`, L2-normalized.
///
/// Returns `None` when the iteration cap is hit. Nodes without neighbors
/// score 0, as does every node of an edgeless graph.
pub fn eigenvector_centrality(
    adj: &[Vec<usize>],
    max_iterations: usize,
    tolerance: f64,
) -> Option<Vec<f64>> {
    let n = adj.len();
    if n == 0 || adj.iter().all(Vec::is_empty) {
        return Some(vec![0.0; n]);
    }

    let mut x = vec![1.0 / n as f64; n];
    for _ in 0..max_iterations {
        let last = x.clone();
        for (v, nbrs) in adj.iter().enumerate() {
            for &w in nbrs {
                x[w] += last[v];
            }
        }
        let norm = x.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }
        x.iter_mut().for_each(|v| *v /= norm);

        let diff: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if diff < n as f64 * tolerance {
            return Some(
                x.iter()
                    .zip(adj)
                    .map(|(&v, nbrs)| if nbrs.is_empty() { 0.0 } else { sanitize(v) })
                    .collect(),
            );
        }
    }
    None
}

/// Freeman centralization: `Σ(max - c) / denom`, clamped to `[0, 1]`.
fn freeman(values: &[f64], denom: f64) -> f64 {
    let max = values.iter().copied().fold(0.0_f64, f64::max);
    if denom <= 0.0 {
        return 0.0;
    }
    sanitize(values.iter().map(|v| max - v).sum::<f64>() / denom)
}

/// Clamp to `[0, 1]`, mapping NaN/Inf to 0.
pub(crate) fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::ChannelRecord;
    use crate::core::node::NodeRecord;
    use approx::assert_relative_eq;

    fn adjacency(n: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
        let mut adj = vec![Vec::new(); n];
        for &(a, b) in edges {
            adj[a].push(b);
            adj[b].push(a);
        }
        adj
    }

    fn star(leaves: usize) -> Vec<Vec<usize>> {
        let edges: Vec<_> = (1..=leaves).map(|i| (0, i)).collect();
        adjacency(leaves + 1, &edges)
    }

    #[test]
    fn test_degree_star() {
        let deg = degree_centrality(&star(4));
        assert_relative_eq!(deg[0], 1.0);
        assert_relative_eq!(deg[1], 0.25);
    }

    #[test]
    fn test_betweenness_path_exact() {
        // 0 - 1 - 2
        let adj = adjacency(3, &[(0, 1), (1, 2)]);
        let b = betweenness_centrality(&adj, &[0, 1, 2]);
        assert_relative_eq!(b[0], 0.0);
        assert_relative_eq!(b[1], 1.0);
        assert_relative_eq!(b[2], 0.0);
    }

    #[test]
    fn test_betweenness_star_center() {
        let adj = star(4);
        let b = betweenness_centrality(&adj, &(0..5).collect::<Vec<_>>());
        assert_relative_eq!(b[0], 1.0);
        for leaf in 1..5 {
            assert_relative_eq!(b[leaf], 0.0);
        }
    }

    #[test]
    fn test_betweenness_sampled_is_bounded() {
        let adj = star(20);
        let mut rng = StdRng::seed_from_u64(7);
        let pivots = sample_pivots(adj.len(), 5, &mut rng);
        assert_eq!(pivots.len(), 5);
        let b = betweenness_centrality(&adj, &pivots);
        assert!(b.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_closeness_exact_path() {
        // 0 - 1 - 2 : center has distances 1,1 -> 1.0; ends 1,2 -> 2/3
        let adj = adjacency(3, &[(0, 1), (1, 2)]);
        let c = closeness_centrality(&adj, &[0, 1, 2]);
        assert_relative_eq!(c[1], 1.0);
        assert_relative_eq!(c[0], 2.0 / 3.0);
    }

    #[test]
    fn test_closeness_disconnected_scaled() {
        // 0 - 1, 2 isolated: node 0 reaches 1 of 2 others at distance 1.
        let adj = adjacency(3, &[(0, 1)]);
        let c = closeness_centrality(&adj, &[0, 1, 2]);
        assert_relative_eq!(c[0], 0.5);
        assert_eq!(c[2], 0.0);
    }

    #[test]
    fn test_eigenvector_star() {
        let e = eigenvector_centrality(&star(4), 1000, 1e-6).unwrap();
        assert!(e[0] > e[1]);
        assert_relative_eq!(e[1], e[2], epsilon = 1e-6);
        let norm: f64 = e.iter().map(|v| v * v).sum::<f64>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_eigenvector_non_convergence_returns_none() {
        assert!(eigenvector_centrality(&star(4), 1, 1e-12).is_none());
    }

    #[test]
    fn test_eigenvector_edgeless_is_zero() {
        let e = eigenvector_centrality(&adjacency(3, &[]), 1000, 1e-6).unwrap();
        assert_eq!(e, vec![0.0; 3]);
    }

    #[test]
    fn test_report_degrades_on_non_convergence() {
        let nodes = ["A", "B", "C"]
            .iter()
            .map(|id| NodeRecord::new(*id, ""))
            .collect();
        let snapshot = GraphSnapshot::build(
            nodes,
            vec![
                ChannelRecord::new("ab", "A", "B", 100),
                ChannelRecord::new("bc", "B", "C", 100),
            ],
        )
        .unwrap();
        let config = AnalysisConfig {
            eigenvector_max_iterations: 1,
            eigenvector_tolerance: 1e-12,
            ..Default::default()
        };
        let report = CentralityAnalyzer::centrality(&snapshot, None, &config).unwrap();
        assert!(!report.eigenvector_converged);
        assert!(report.nodes.values().all(|c| c.eigenvector == 0.0));
        assert_eq!(
            report.diagnostics,
            vec![Diagnostic::EigenvectorNotConverged { iterations: 1 }]
        );
        // Other measures are still computed.
        assert_relative_eq!(report.nodes[&NodeId::new("B")].betweenness, 1.0);
    }

    #[test]
    fn test_single_node_query() {
        let nodes = ["A", "B"].iter().map(|id| NodeRecord::new(*id, "")).collect();
        let snapshot =
            GraphSnapshot::build(nodes, vec![ChannelRecord::new("ab", "A", "B", 100)]).unwrap();
        let report = CentralityAnalyzer::centrality(
            &snapshot,
            Some(&NodeId::new("A")),
            &AnalysisConfig::default(),
        )
        .unwrap();
        assert_eq!(report.nodes.len(), 1);
        assert_relative_eq!(report.nodes[&NodeId::new("A")].degree, 1.0);
        assert!(!report.approximate);

        let missing = CentralityAnalyzer::centrality(
            &snapshot,
            Some(&NodeId::new("Z")),
            &AnalysisConfig::default(),
        );
        assert!(missing.is_err());
    }

    #[test]
    fn test_star_centralization() {
        let nodes = (0..5).map(|i| NodeRecord::new(format!("N{i}"), "")).collect();
        let channels = (1..5)
            .map(|i| ChannelRecord::new(format!("c{i}"), "N0", format!("N{i}"), 100))
            .collect();
        let snapshot = GraphSnapshot::build(nodes, channels).unwrap();
        let scores = CentralityAnalyzer::scores(&snapshot, &AnalysisConfig::default());
        let c = scores.centralization();
        assert_relative_eq!(c.degree, 1.0, epsilon = 1e-9);
        assert_relative_eq!(c.betweenness, 1.0, epsilon = 1e-9);
        assert_relative_eq!(c.closeness, 1.0, epsilon = 1e-9);
        assert!(c.eigenvector > 0.9 && c.eigenvector <= 1.0);
    }
}
