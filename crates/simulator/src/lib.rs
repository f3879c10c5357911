//! rainsim driver.
//!
//! Builds on `rainsim-simulation` to run whole clusters under a simple
//! injected request stream and report client-observed latencies plus the
//! per-node protocol statistics as JSON.
//!
//! # Example
//!
//! ```ignore
//! use rainsim_simulator::{Simulator, SimulatorConfig};
//! use rainsim_types::ProtocolVariant;
//! use std::time::Duration;
//!
//! let config = SimulatorConfig::new(3, 4, ProtocolVariant::Scalar)
//!     .with_duration(Duration::from_secs(10))
//!     .with_seed(7);
//! let report = Simulator::new(config).run()?;
//! println!("p99 put latency: {}us", report.put_latency.p99_us);
//! ```

pub mod config;
pub mod metrics;
pub mod runner;

pub use config::SimulatorConfig;
pub use metrics::{LatencyRecorder, LatencySummary};
pub use runner::{RunReport, Simulator};
