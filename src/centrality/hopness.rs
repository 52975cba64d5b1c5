use crate::centrality::measures::{sample_pivots, CentralityAnalyzer};
use crate::core::config::AnalysisConfig;
use crate::core::error::{AnalysisError, Diagnostic};
use crate::core::node::NodeId;
use crate::graph::connectivity::{bfs_distances, UNREACHABLE};
use crate::graph::snapshot::GraphSnapshot;
use log::{debug, warn};
use petgraph::graph::NodeIndex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Reachability from one source node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceHopness {
    pub source: NodeId,
    /// Reachable nodes over `n - 1`.
    pub reachability_ratio: f64,
    pub reachable_nodes: usize,
    /// Mean hop count to reachable nodes.
    pub avg_distance: f64,
    /// `1 / avg_distance`, 0 when nothing is reachable.
    pub routing_efficiency: f64,
    /// Largest hop count to a reachable node.
    pub eccentricity: u32,
    /// Number of nodes at each hop distance.
    pub hop_distribution: BTreeMap<u32, usize>,
}

/// Averages over all sources that finished in time.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct HopnessAggregate {
    pub avg_reachability_ratio: f64,
    pub avg_distance: f64,
    pub avg_routing_efficiency: f64,
    pub max_eccentricity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopnessReport {
    pub sources: Vec<SourceHopness>,
    pub network: HopnessAggregate,
    pub sources_requested: usize,
    /// Sources whose BFS exceeded the task timeout.
    pub timed_out: Vec<NodeId>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CentralityAnalyzer {
    /// Hop-count reachability from `source_nodes`, or from `sample_size`
    /// seeded-random nodes when none are named.
    ///
    /// One BFS per source runs on a bounded rayon pool. A source whose BFS
    /// takes longer than the configured timeout is dropped from the report
    /// and logged; the rest of the batch is kept.
    pub fn hopness(
        snapshot: &GraphSnapshot,
        source_nodes: Option<&[NodeId]>,
        sample_size: usize,
        config: &AnalysisConfig,
    ) -> Result<HopnessReport, AnalysisError> {
        let sources: Vec<usize> = match source_nodes {
            Some(ids) => ids
                .iter()
                .map(|id| snapshot.require(id).map(|idx| idx.index()))
                .collect::<Result<_, _>>()?,
            None => {
                let mut rng = StdRng::seed_from_u64(config.sampling_seed);
                sample_pivots(snapshot.node_count(), sample_size, &mut rng)
            }
        };

        let adj = snapshot.adjacency();
        let timeout = config.hopness_timeout();
        let mut diagnostics = Vec::new();

        let run = |s: usize| -> (usize, Option<SourceHopness>, Duration) {
            let started = Instant::now();
            let result = source_hopness(&adj, s, snapshot.node_id(NodeIndex::new(s)));
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                (s, None, elapsed)
            } else {
                (s, Some(result), elapsed)
            }
        };

        let outcomes: Vec<(usize, Option<SourceHopness>, Duration)> =
            match rayon::ThreadPoolBuilder::new()
                .num_threads(config.hopness_workers.max(1))
                .build()
            {
                Ok(pool) => pool.install(|| sources.par_iter().map(|&s| run(s)).collect()),
                Err(e) => {
                    warn!("hopness worker pool unavailable ({}), running sequentially", e);
                    diagnostics.push(Diagnostic::HopnessPoolUnavailable {
                        reason: e.to_string(),
                    });
                    sources.iter().map(|&s| run(s)).collect()
                }
            };

        let mut results = Vec::with_capacity(outcomes.len());
        let mut timed_out = Vec::new();
        for (s, result, elapsed) in outcomes {
            match result {
                Some(r) => results.push(r),
                None => {
                    let id = snapshot.node_id(NodeIndex::new(s)).clone();
                    warn!(
                        "hopness for {} took {:?}, exceeding {:?}; dropped",
                        id, elapsed, timeout
                    );
                    diagnostics.push(Diagnostic::HopnessTimeout {
                        source: id.clone(),
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                    timed_out.push(id);
                }
            }
        }
        debug!(
            "hopness: {} of {} sources completed",
            results.len(),
            sources.len()
        );

        Ok(HopnessReport {
            network: aggregate(&results),
            sources: results,
            sources_requested: sources.len(),
            timed_out,
            diagnostics,
        })
    }
}

fn source_hopness(adj: &[Vec<usize>], s: usize, id: &NodeId) -> SourceHopness {
    let dist = bfs_distances(adj, s);
    let mut hop_distribution = BTreeMap::new();
    let mut reachable = 0usize;
    let mut total = 0u64;
    let mut eccentricity = 0u32;
    for (v, &d) in dist.iter().enumerate() {
        if v == s || d == UNREACHABLE {
            continue;
        }
        reachable += 1;
        total += d as u64;
        eccentricity = eccentricity.max(d);
        *hop_distribution.entry(d).or_insert(0) += 1;
    }

    let others = adj.len().saturating_sub(1);
    let avg_distance = if reachable == 0 {
        0.0
    } else {
        total as f64 / reachable as f64
    };
    SourceHopness {
        source: id.clone(),
        reachability_ratio: if others == 0 {
            0.0
        } else {
            reachable as f64 / others as f64
        },
        reachable_nodes: reachable,
        avg_distance,
        routing_efficiency: if avg_distance > 0.0 { 1.0 / avg_distance } else { 0.0 },
        eccentricity,
        hop_distribution,
    }
}

fn aggregate(results: &[SourceHopness]) -> HopnessAggregate {
    if results.is_empty() {
        return HopnessAggregate::default();
    }
    let n = results.len() as f64;
    HopnessAggregate {
        avg_reachability_ratio: results.iter().map(|r| r.reachability_ratio).sum::<f64>() / n,
        avg_distance: results.iter().map(|r| r.avg_distance).sum::<f64>() / n,
        avg_routing_efficiency: results.iter().map(|r| r.routing_efficiency).sum::<f64>() / n,
        max_eccentricity: results.iter().map(|r| r.eccentricity).max().unwrap_or(0),
    }
}
