//! DazFlow Index: a node's expected payment reliability across a ladder of
//! amounts, fused from max-flow probes, balance shape and betweenness.

pub mod bottleneck;
pub mod index;
pub mod reliability;

pub use bottleneck::{Bottleneck, ChannelIssue, Severity};
pub use index::{AnalysisStatus, DazFlowAnalysis, DazFlowIndex, DazFlowReport, DazFlowRequest};
pub use reliability::{ConfidenceInterval, ReliabilityCurve};
