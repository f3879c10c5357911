//! Node shells tying a protocol engine to a CPU and a network interface.

pub mod network;
pub mod server;

pub use network::{NetworkLink, NetworkStatsDocument};
pub use server::{NodeStatsDocument, ServerNode, ServerNodeParams};
