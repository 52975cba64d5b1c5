use serde::{Deserialize, Serialize};
use std::fmt;

/// Public key identifying a Lightning node (hex string).
///
/// # Examples
///
/// ```
/// use dazflow_engine::core::node::NodeId;
///
/// let a = NodeId::new("02aa");
/// let b = NodeId::new("03bb");
/// assert_ne!(a, b);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(pubkey: impl Into<String>) -> Self {
        Self(pubkey.into())
    }

    /// Returns the hex representation of the public key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A node as delivered by the data-acquisition layer.
///
/// `total_capacity` and `channel_count` are the gossip-reported values and are
/// informational only; the analyzers derive their own figures from the
/// channel list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub pubkey: NodeId,
    #[serde(default)]
    pub alias: String,
    #[serde(default)]
    pub total_capacity: u64,
    #[serde(default)]
    pub channel_count: u32,
    /// Unix timestamp of the last gossip update.
    #[serde(default)]
    pub last_update: u64,
}

impl NodeRecord {
    pub fn new(pubkey: impl Into<NodeId>, alias: impl Into<String>) -> Self {
        Self {
            pubkey: pubkey.into(),
            alias: alias.into(),
            total_capacity: 0,
            channel_count: 0,
            last_update: 0,
        }
    }

    pub fn with_capacity(mut self, total_capacity: u64, channel_count: u32) -> Self {
        self.total_capacity = total_capacity;
        self.channel_count = channel_count;
        self
    }

    pub fn with_last_update(mut self, last_update: u64) -> Self {
        self.last_update = last_update;
        self
    }

    /// Alias for display, falling back to a shortened pubkey.
    pub fn display_name(&self) -> String {
        if self.alias.is_empty() {
            self.pubkey.as_str().chars().take(16).collect()
        } else {
            self.alias.clone()
        }
    }
}
