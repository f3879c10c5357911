//! Protocol engines.
//!
//! Two engines share one skeleton: [`gr`] tracks a scalar global stable
//! time, [`grv`] a per-replica vector. Both run entirely inside the
//! cooperative CPU model: every handler is one CPU run, every lock crossing
//! is a scheduled event, and every outbound message is charged build and
//! send time before it reaches the network.

pub mod ctx;
pub mod gr;
pub mod grv;
pub mod slots;
pub mod stats;

pub use ctx::{Ctx, Transport};
pub use gr::GrState;
pub use grv::GrvState;
pub use stats::{ServerStats, ServerStatsDocument};
