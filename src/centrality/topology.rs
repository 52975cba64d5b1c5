use crate::centrality::measures::CentralityAnalyzer;
use crate::graph::connectivity::{bfs_distances, connected_components, cut_structure, UNREACHABLE};
use crate::graph::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};

/// Whole-network structural metrics.
///
/// Path-length metrics (diameter, radius, average shortest path) are taken
/// over the giant component when the graph is disconnected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TopologyMetrics {
    pub node_count: usize,
    /// Distinct connected node pairs.
    pub edge_count: usize,
    pub channel_count: usize,
    pub density: f64,
    pub avg_degree: f64,
    pub connected_components: usize,
    pub giant_component_size: usize,
    pub giant_component_ratio: f64,
    pub diameter: u32,
    pub radius: u32,
    pub avg_shortest_path: f64,
    pub transitivity: f64,
    pub avg_clustering: f64,
    /// In `[-1, 1]`.
    pub degree_assortativity: f64,
    pub cut_edges_count: usize,
    pub articulation_points_count: usize,
    /// `max(0, 1 - 2 * cut_edge_ratio - articulation_point_ratio)`.
    pub robustness_score: f64,
}

impl CentralityAnalyzer {
    /// Density, path lengths, clustering, assortativity and cut structure.
    pub fn topology_metrics(snapshot: &GraphSnapshot) -> TopologyMetrics {
        let adj = snapshot.adjacency();
        let n = adj.len();
        if n == 0 {
            return TopologyMetrics::default();
        }
        let m = snapshot.pair_count();

        let components = connected_components(&adj);
        let giant = components.first().cloned().unwrap_or_default();
        let paths = path_lengths(&adj, &giant);
        let (transitivity, avg_clustering) = clustering(&adj);
        let cuts = cut_structure(&adj);

        let cut_edge_ratio = if m == 0 {
            0.0
        } else {
            cuts.bridges.len() as f64 / m as f64
        };
        let articulation_ratio = cuts.articulation_points.len() as f64 / n as f64;

        TopologyMetrics {
            node_count: n,
            edge_count: m,
            channel_count: snapshot.channel_count(),
            density: if n < 2 {
                0.0
            } else {
                2.0 * m as f64 / (n * (n - 1)) as f64
            },
            avg_degree: 2.0 * m as f64 / n as f64,
            connected_components: components.len(),
            giant_component_size: giant.len(),
            giant_component_ratio: giant.len() as f64 / n as f64,
            diameter: paths.diameter,
            radius: paths.radius,
            avg_shortest_path: paths.average,
            transitivity,
            avg_clustering,
            degree_assortativity: degree_assortativity(&adj),
            cut_edges_count: cuts.bridges.len(),
            articulation_points_count: cuts.articulation_points.len(),
            robustness_score: (1.0 - 2.0 * cut_edge_ratio - articulation_ratio).max(0.0),
        }
    }
}

struct PathLengths {
    diameter: u32,
    radius: u32,
    average: f64,
}

/// Exact eccentricities over one connected component.
fn path_lengths(adj: &[Vec<usize>], component: &[usize]) -> PathLengths {
    if component.len() < 2 {
        return PathLengths {
            diameter: 0,
            radius: 0,
            average: 0.0,
        };
    }
    let mut diameter = 0u32;
    let mut radius = u32::MAX;
    let mut total = 0u64;
    let mut pairs = 0u64;
    for &v in component {
        let dist = bfs_distances(adj, v);
        let mut eccentricity = 0u32;
        for &w in component {
            let d = dist[w];
            if w != v && d != UNREACHABLE {
                eccentricity = eccentricity.max(d);
                total += d as u64;
                pairs += 1;
            }
        }
        diameter = diameter.max(eccentricity);
        radius = radius.min(eccentricity);
    }
    PathLengths {
        diameter,
        radius,
        average: total as f64 / pairs as f64,
    }
}

/// Global transitivity and mean local clustering coefficient.
fn clustering(adj: &[Vec<usize>]) -> (f64, f64) {
    let n = adj.len();
    let mut marked = vec![false; n];
    let mut closed = 0u64;
    let mut triples = 0u64;
    let mut local_sum = 0.0;

    for v in 0..n {
        let k = adj[v].len() as u64;
        if k < 2 {
            continue;
        }
        for &u in &adj[v] {
            marked[u] = true;
        }
        let mut links = 0u64;
        for &u in &adj[v] {
            links += adj[u].iter().filter(|&&w| marked[w]).count() as u64;
        }
        for &u in &adj[v] {
            marked[u] = false;
        }
        // Each neighbor-neighbor link was seen from both ends.
        let triangles = links / 2;
        let possible = k * (k - 1) / 2;
        closed += triangles;
        triples += possible;
        local_sum += triangles as f64 / possible as f64;
    }

    let transitivity = if triples == 0 {
        0.0
    } else {
        closed as f64 / triples as f64
    };
    (transitivity, local_sum / n as f64)
}

/// Pearson correlation of the degrees at either end of every edge.
fn degree_assortativity(adj: &[Vec<usize>]) -> f64 {
    let mut count = 0.0;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    let mut sum_prod = 0.0;
    for nbrs in adj {
        let x = nbrs.len() as f64;
        for &w in nbrs {
            let y = adj[w].len() as f64;
            count += 1.0;
            sum += x;
            sum_sq += x * x;
            sum_prod += x * y;
        }
    }
    if count == 0.0 {
        return 0.0;
    }
    let mean = sum / count;
    let variance = sum_sq / count - mean * mean;
    if variance <= f64::EPSILON {
        return 0.0;
    }
    let r = (sum_prod / count - mean * mean) / variance;
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
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

    fn build(ids: &[&str], edges: &[(&str, &str)]) -> GraphSnapshot {
        let nodes = ids.iter().map(|id| NodeRecord::new(*id, "")).collect();
        let channels = edges
            .iter()
            .enumerate()
            .map(|(i, (a, b))| ChannelRecord::new(format!("c{i}"), *a, *b, 1000))
            .collect();
        GraphSnapshot::build(nodes, channels).unwrap()
    }

    #[test]
    fn test_triangle() {
        let snap = build(&["A", "B", "C"], &[("A", "B"), ("B", "C"), ("C", "A")]);
        let t = CentralityAnalyzer::topology_metrics(&snap);
        assert_relative_eq!(t.density, 1.0);
        assert_eq!(t.diameter, 1);
        assert_eq!(t.radius, 1);
        assert_relative_eq!(t.transitivity, 1.0);
        assert_relative_eq!(t.avg_clustering, 1.0);
        assert_eq!(t.cut_edges_count, 0);
        assert_eq!(t.articulation_points_count, 0);
        assert_relative_eq!(t.robustness_score, 1.0);
        // Regular graph: degree variance is zero.
        assert_eq!(t.degree_assortativity, 0.0);
    }

    #[test]
    fn test_star_is_disassortative_and_fragile() {
        let snap = build(
            &["H", "A", "B", "C"],
            &[("H", "A"), ("H", "B"), ("H", "C")],
        );
        let t = CentralityAnalyzer::topology_metrics(&snap);
        assert_relative_eq!(t.degree_assortativity, -1.0);
        assert_eq!(t.diameter, 2);
        assert_eq!(t.radius, 1);
        assert_eq!(t.cut_edges_count, 3);
        assert_eq!(t.articulation_points_count, 1);
        assert_eq!(t.robustness_score, 0.0);
        assert_eq!(t.transitivity, 0.0);
    }

    #[test]
    fn test_disconnected_uses_giant_component() {
        // Path of 4 (diameter 3) and a separate pair.
        let snap = build(
            &["A", "B", "C", "D", "X", "Y"],
            &[("A", "B"), ("B", "C"), ("C", "D"), ("X", "Y")],
        );
        let t = CentralityAnalyzer::topology_metrics(&snap);
        assert_eq!(t.connected_components, 2);
        assert_eq!(t.giant_component_size, 4);
        assert_relative_eq!(t.giant_component_ratio, 4.0 / 6.0);
        assert_eq!(t.diameter, 3);
        assert_eq!(t.radius, 2);
        assert_relative_eq!(t.avg_shortest_path, 20.0 / 12.0);
    }

    #[test]
    fn test_empty_and_edgeless() {
        let empty = GraphSnapshot::build(vec![], vec![]).unwrap();
        assert_eq!(
            CentralityAnalyzer::topology_metrics(&empty),
            TopologyMetrics::default()
        );

        let lonely = build(&["A", "B"], &[]);
        let t = CentralityAnalyzer::topology_metrics(&lonely);
        assert_eq!(t.density, 0.0);
        assert_eq!(t.diameter, 0);
        assert_relative_eq!(t.giant_component_ratio, 0.5);
        assert_relative_eq!(t.robustness_score, 1.0);
    }
}
