use crate::core::channel::ChannelRecord;
use crate::core::config::AnalysisConfig;
use crate::core::error::AnalysisError;
use crate::core::node::NodeRecord;
use crate::graph::snapshot::GraphSnapshot;
use serde::{Deserialize, Serialize};

/// Node and channel lists as exchanged with the data-acquisition layer.
///
/// This is the JSON document the CLI reads and `generate` writes.
///
/// # Examples
///
/// ```
/// use dazflow_engine::core::network::NetworkData;
///
/// let data = NetworkData::from_json(
///     r#"{
///         "nodes": [{ "pubkey": "A" }, { "pubkey": "B", "alias": "bob" }],
///         "channels": [{ "channel_id": "c1", "node1_pub": "A", "node2_pub": "B", "capacity": 1000 }]
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(data.nodes.len(), 2);
/// assert!(data.channels[0].active);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NetworkData {
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub channels: Vec<ChannelRecord>,
}

impl NetworkData {
    pub fn new(nodes: Vec<NodeRecord>, channels: Vec<ChannelRecord>) -> Self {
        Self { nodes, channels }
    }

    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        serde_json::from_str(json)
            .map_err(|e| AnalysisError::invalid(format!("malformed network document: {}", e)))
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::invalid(format!("cannot serialize network: {}", e)))
    }

    /// Validate and build an immutable snapshot.
    pub fn into_snapshot(self, config: &AnalysisConfig) -> Result<GraphSnapshot, AnalysisError> {
        GraphSnapshot::build_with(self.nodes, self.channels, config)
    }
}
