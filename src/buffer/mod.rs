//! Offline Buffer
//!
//! Ties the append-only log to a periodic decision:
//! - `OfflineBuffer`: record, replay, evict and the tick loop
//! - `BufferConfig`: log location, interval, size limit
//! - `Condition` / `OnlineFlag`: whether the consumer is reachable
//! - `BufferStats`: counters for what the buffer has done

mod condition;
mod config;
mod controller;
mod stats;
mod timer;

pub use condition::{Condition, OnlineFlag};
pub use config::BufferConfig;
pub use controller::{
    BufferState, OfflineBuffer, OfflineBufferBuilder, RecordHandler, ReplayReport, TickOutcome,
};
pub use stats::BufferStats;
pub use timer::TickHandle;
