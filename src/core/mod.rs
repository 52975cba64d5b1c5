//! Input records, configuration and the error taxonomy.

pub mod channel;
pub mod config;
pub mod error;
pub mod network;
pub mod node;
