//! Graph snapshots and traversal primitives.

pub mod connectivity;
pub mod snapshot;
