//! Deterministic simulation runner.
//!
//! Given the same parameters and seed, a run produces identical results
//! every time: events are delivered from a totally ordered queue, nodes are
//! built and seeded in id order, and nothing consults a real clock.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                     Simulation                        │
//! │                                                       │
//! │  ┌──────────────────────────────────────────────────┐ │
//! │  │   EventQueue (BTreeMap<(time, seq), event>)      │ │
//! │  └───────────────────────┬──────────────────────────┘ │
//! │                          │                            │
//! │                          ▼                            │
//! │  ┌──────────────────────────────────────────────────┐ │
//! │  │   nodes: Vec<ServerNode>  ·  client inboxes      │ │
//! │  └───────────────────────┬──────────────────────────┘ │
//! │                          │                            │
//! │                          ▼                            │
//! │  ┌──────────────────────────────────────────────────┐ │
//! │  │   sends / self-schedules → back into the queue   │ │
//! │  └──────────────────────────────────────────────────┘ │
//! └───────────────────────────────────────────────────────┘
//! ```

mod event_queue;
mod runner;

pub use event_queue::{EventKey, EventQueue};
pub use runner::{Simulation, SimulationParams};
