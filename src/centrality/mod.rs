//! Structural analysis of the topology graph: centrality families, hub
//! ranking, hop reachability, network-wide metrics and node positioning.

pub mod hopness;
pub mod hubness;
pub mod measures;
pub mod positioning;
pub mod topology;
