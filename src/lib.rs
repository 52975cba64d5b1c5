//! # dazflow-engine
//!
//! Lightning Network topology and flow analysis.
//!
//! Given a snapshot of nodes and payment channels, the engine computes
//! max-flow based payment success probabilities between nodes, centrality
//! and topology metrics, and the DazFlow Index: a single liquidity-health
//! score per node that fuses both.
//!
//! ## Architecture
//!
//! - **core** — Input records, configuration, errors and diagnostics
//! - **graph** — Immutable graph snapshots and connectivity primitives
//! - **flow** — Max-flow, probability curves, liquidity profiles, rebalancing
//! - **centrality** — Centrality measures, hubness, hopness, topology, positioning
//! - **dazflow** — Reliability curve, bottleneck scan and the composite index
//! - **simulation** — Seeded random network generation
//!
//! Every analysis is a pure function of a [`graph::snapshot::GraphSnapshot`];
//! a snapshot can be shared across threads once built.

pub mod centrality;
pub mod core;
pub mod dazflow;
pub mod flow;
pub mod graph;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::centrality::measures::CentralityAnalyzer;
    pub use crate::core::channel::ChannelRecord;
    pub use crate::core::config::{AnalysisConfig, BalancePolicy};
    pub use crate::core::error::{AnalysisError, Diagnostic};
    pub use crate::core::network::NetworkData;
    pub use crate::core::node::{NodeId, NodeRecord};
    pub use crate::dazflow::{DazFlowIndex, DazFlowReport, DazFlowRequest};
    pub use crate::flow::max_flow::{FlowAnalyzer, FlowResult};
    pub use crate::graph::snapshot::GraphSnapshot;
}
