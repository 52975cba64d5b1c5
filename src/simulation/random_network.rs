//! Random Lightning-like networks for demos, benchmarks and property tests.
//!
//! Peers are chosen by preferential attachment, so a handful of well-connected
//! hubs emerge the way they do on the real network. Generation is fully
//! determined by `seed`.

use crate::core::channel::ChannelRecord;
use crate::core::network::NetworkData;
use crate::core::node::NodeRecord;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Shape of a generated network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub node_count: usize,
    /// Mean channel endpoints per node; channels = nodes × avg / 2.
    pub avg_channels_per_node: usize,
    /// Minimum channel capacity in sats.
    pub min_capacity: u64,
    /// Maximum channel capacity in sats.
    pub max_capacity: u64,
    /// Share of channels marked inactive.
    pub inactive_ratio: f64,
    /// Share of channels published without balance information.
    pub unknown_balance_ratio: f64,
    pub seed: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            node_count: 50,
            avg_channels_per_node: 4,
            min_capacity: 100_000,
            max_capacity: 20_000_000,
            inactive_ratio: 0.05,
            unknown_balance_ratio: 0.1,
            seed: 42,
        }
    }
}

/// Pubkey-shaped id for the `i`-th generated node.
pub fn node_pubkey(i: usize) -> String {
    format!("02{:064x}", i)
}

/// Generate a random network.
///
/// Never produces self-loops; parallel channels between the same pair are
/// possible but rare, as on the real network.
pub fn generate_random_network(config: &NetworkConfig) -> NetworkData {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let n = config.node_count;

    let nodes: Vec<NodeRecord> = (0..n)
        .map(|i| {
            NodeRecord::new(node_pubkey(i), format!("node-{:03}", i))
                .with_last_update(1_700_000_000 + rng.gen_range(0..86_400))
        })
        .collect();
    if n < 2 {
        return NetworkData::new(nodes, Vec::new());
    }

    let target = n * config.avg_channels_per_node / 2;
    let (low, high) = if config.min_capacity <= config.max_capacity {
        (config.min_capacity.max(1), config.max_capacity.max(1))
    } else {
        (config.max_capacity.max(1), config.min_capacity.max(1))
    };

    // Each node appears once plus once per channel endpoint it holds.
    let mut endpoints: Vec<usize> = (0..n).collect();
    let mut pairs = HashSet::new();
    let mut channels = Vec::with_capacity(target);
    let mut totals = vec![(0u64, 0u32); n];

    for c in 0..target {
        let a = c % n;
        let mut b = endpoints[rng.gen_range(0..endpoints.len())];
        let mut attempts = 0;
        while (b == a || pairs.contains(&(a.min(b), a.max(b)))) && attempts < 8 {
            b = endpoints[rng.gen_range(0..endpoints.len())];
            attempts += 1;
        }
        if b == a {
            b = (a + 1 + rng.gen_range(0..n - 1)) % n;
        }
        pairs.insert((a.min(b), a.max(b)));
        endpoints.push(a);
        endpoints.push(b);

        let capacity = rng.gen_range(low..=high);
        for end in [a, b] {
            totals[end].0 += capacity;
            totals[end].1 += 1;
        }
        let mut channel = ChannelRecord::new(
            format!("{}x{}x{}", 800_000 + c, a, b),
            node_pubkey(a),
            node_pubkey(b),
            capacity as i64,
        )
        .with_fee_rates(rng.gen_range(0..2_000), rng.gen_range(0..2_000))
        .with_active(!rng.gen_bool(config.inactive_ratio.clamp(0.0, 1.0)));

        if !rng.gen_bool(config.unknown_balance_ratio.clamp(0.0, 1.0)) {
            let local = rng.gen_range(0..=capacity);
            channel = channel.with_balances(local as i64, (capacity - local) as i64);
        }
        channels.push(channel);
    }

    // Gossip-style per-node totals.
    let nodes = nodes
        .into_iter()
        .zip(totals)
        .map(|(node, (capacity, count))| node.with_capacity(capacity, count))
        .collect();
    NetworkData::new(nodes, channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::AnalysisConfig;

    #[test]
    fn test_generation_is_seeded() {
        let config = NetworkConfig::default();
        assert_eq!(
            generate_random_network(&config),
            generate_random_network(&config)
        );
        let other = NetworkConfig {
            seed: 7,
            ..Default::default()
        };
        assert_ne!(
            generate_random_network(&config),
            generate_random_network(&other)
        );
    }

    #[test]
    fn test_generated_network_builds() {
        let config = NetworkConfig {
            node_count: 30,
            avg_channels_per_node: 6,
            ..Default::default()
        };
        let data = generate_random_network(&config);
        assert_eq!(data.nodes.len(), 30);
        assert_eq!(data.channels.len(), 90);
        assert!(data
            .channels
            .iter()
            .all(|c| c.node1_pub != c.node2_pub && c.capacity >= 100_000));

        let snapshot = data.into_snapshot(&AnalysisConfig::default()).unwrap();
        assert_eq!(snapshot.channel_count(), 90);
        assert!(snapshot.diagnostics().is_empty());
    }

    #[test]
    fn test_node_totals_match_channels() {
        let data = generate_random_network(&NetworkConfig::default());
        let channel_total: u64 = data.channels.iter().map(|c| c.capacity as u64).sum();
        let node_total: u64 = data.nodes.iter().map(|n| n.total_capacity).sum();
        assert_eq!(node_total, 2 * channel_total);

        let endpoints: u32 = data.nodes.iter().map(|n| n.channel_count).sum();
        assert_eq!(endpoints as usize, 2 * data.channels.len());
    }

    #[test]
    fn test_tiny_networks() {
        let single = generate_random_network(&NetworkConfig {
            node_count: 1,
            ..Default::default()
        });
        assert_eq!(single.nodes.len(), 1);
        assert!(single.channels.is_empty());

        let empty = generate_random_network(&NetworkConfig {
            node_count: 0,
            ..Default::default()
        });
        assert!(empty.nodes.is_empty());
    }
}
