use crate::centrality::measures::{sanitize, CentralityAnalyzer, NodeCentrality};
use crate::core::config::AnalysisConfig;
use crate::core::error::{AnalysisError, Diagnostic};
use crate::core::node::NodeId;
use crate::graph::connectivity::{bfs_distances, UNREACHABLE};
use crate::graph::snapshot::GraphSnapshot;
use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Weights of hub-connection ratio, average neighbor centrality and
/// eccentricity score in the strategic score.
pub const STRATEGIC_WEIGHTS: [f64; 3] = [0.4, 0.4, 0.2];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NeighborhoodStats {
    pub neighbor_count: usize,
    pub avg_neighbor_degree: f64,
    /// Mean degree centrality of the neighbors.
    pub avg_neighbor_centrality: f64,
    /// Neighbors among the top hubs by degree.
    pub hub_connections: usize,
    pub hub_connection_ratio: f64,
    pub total_neighbor_capacity: u64,
}

/// Where a node sits in the network and how well that position serves routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodePositioning {
    pub node: NodeId,
    pub alias: String,
    pub centrality: NodeCentrality,
    pub degree: usize,
    /// 1 for the highest degree; ties share a rank.
    pub degree_rank: usize,
    /// Share of other nodes with strictly lower degree, in `[0, 1]`.
    pub degree_percentile: f64,
    pub neighborhood: NeighborhoodStats,
    /// Largest hop distance to a reachable node.
    pub eccentricity: u32,
    /// `1 / eccentricity`, 0 for isolated nodes.
    pub eccentricity_score: f64,
    /// In `[0, 1]`.
    pub strategic_score: f64,
    pub diagnostics: Vec<Diagnostic>,
}

impl CentralityAnalyzer {
    /// Structural position of `node`: centrality, degree standing,
    /// neighborhood and a composite strategic score.
    pub fn node_positioning(
        snapshot: &GraphSnapshot,
        node: &NodeId,
        config: &AnalysisConfig,
    ) -> Result<NodePositioning, AnalysisError> {
        let idx = snapshot.require(node)?;
        let i = idx.index();
        let scores = Self::scores(snapshot, config);
        let adj = snapshot.adjacency();
        let n = adj.len();

        let degree = adj[i].len();
        let higher = adj.iter().filter(|nbrs| nbrs.len() > degree).count();
        let lower = adj.iter().filter(|nbrs| nbrs.len() < degree).count();

        let hubs: Vec<usize> = snapshot
            .top_nodes_by_degree(config.hub_count + 1)
            .into_iter()
            .map(|h| h.index())
            .filter(|&h| h != i)
            .take(config.hub_count)
            .collect();

        let neighbors = &adj[i];
        let neighborhood = if neighbors.is_empty() {
            NeighborhoodStats::default()
        } else {
            let count = neighbors.len() as f64;
            let hub_connections = neighbors.iter().filter(|&v| hubs.contains(v)).count();
            NeighborhoodStats {
                neighbor_count: neighbors.len(),
                avg_neighbor_degree: neighbors.iter().map(|&v| adj[v].len() as f64).sum::<f64>()
                    / count,
                avg_neighbor_centrality: neighbors.iter().map(|&v| scores.degree[v]).sum::<f64>()
                    / count,
                hub_connections,
                hub_connection_ratio: hub_connections as f64 / count,
                total_neighbor_capacity: neighbors
                    .iter()
                    .map(|&v| snapshot.weighted_degree(NodeIndex::new(v)))
                    .sum(),
            }
        };

        let eccentricity = bfs_distances(&adj, i)
            .into_iter()
            .filter(|&d| d != UNREACHABLE)
            .max()
            .unwrap_or(0);
        let eccentricity_score = if eccentricity == 0 {
            0.0
        } else {
            1.0 / eccentricity as f64
        };

        let strategic_score = sanitize(
            STRATEGIC_WEIGHTS[0] * neighborhood.hub_connection_ratio
                + STRATEGIC_WEIGHTS[1] * neighborhood.avg_neighbor_centrality
                + STRATEGIC_WEIGHTS[2] * eccentricity_score,
        );

        Ok(NodePositioning {
            node: node.clone(),
            alias: snapshot.node(idx).alias.clone(),
            centrality: scores.node(i),
            degree,
            degree_rank: higher + 1,
            degree_percentile: if n < 2 {
                0.0
            } else {
                lower as f64 / (n - 1) as f64
            },
            neighborhood,
            eccentricity,
            eccentricity_score,
            strategic_score,
            diagnostics: scores.diagnostics,
        })
    }
}
