//! Max-flow payment analysis and per-node liquidity tooling.

pub mod liquidity;
pub mod max_flow;
