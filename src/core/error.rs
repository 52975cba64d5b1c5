use crate::core::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors surfaced to callers of the analysis engine.
///
/// Only malformed input and queries for unknown nodes are errors. Empty
/// graphs, isolated nodes and unreachable targets produce zero-valued
/// results instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[error("node {pubkey} not found in snapshot")]
    NodeNotFound { pubkey: NodeId },
}

impl AnalysisError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn not_found(pubkey: &NodeId) -> Self {
        Self::NodeNotFound {
            pubkey: pubkey.clone(),
        }
    }
}

/// A degraded-mode event attached to a report instead of failing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Eigenvector power iteration hit its cap; all scores were zeroed.
    EigenvectorNotConverged { iterations: usize },
    /// A hopness source exceeded its task timeout and was dropped.
    HopnessTimeout { source: NodeId, elapsed_ms: u64 },
    /// The hopness worker pool could not be created; ran sequentially.
    HopnessPoolUnavailable { reason: String },
    /// Channel balances did not reconcile with capacity and were re-estimated.
    BalanceFallback { channel_id: String },
    /// A channel with zero capacity was left out of the snapshot.
    ZeroCapacityChannel { channel_id: String },
    /// Betweenness was not supplied and had to be computed.
    BetweennessComputed { sampled: bool },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::EigenvectorNotConverged { iterations } => write!(
                f,
                "eigenvector centrality did not converge after {} iterations",
                iterations
            ),
            Diagnostic::HopnessTimeout { source, elapsed_ms } => {
                write!(f, "hopness for {} dropped after {}ms", source, elapsed_ms)
            }
            Diagnostic::HopnessPoolUnavailable { reason } => {
                write!(f, "hopness worker pool unavailable: {}", reason)
            }
            Diagnostic::BalanceFallback { channel_id } => {
                write!(f, "channel {} balances re-estimated", channel_id)
            }
            Diagnostic::ZeroCapacityChannel { channel_id } => {
                write!(f, "channel {} skipped (zero capacity)", channel_id)
            }
            Diagnostic::BetweennessComputed { sampled } => {
                if *sampled {
                    write!(f, "betweenness computed from sampled pivots")
                } else {
                    write!(f, "betweenness computed exactly")
                }
            }
        }
    }
}
