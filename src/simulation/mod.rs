//! Synthetic network generation.

pub mod random_network;

pub use random_network::{generate_random_network, NetworkConfig};
