//! Offline Event Log
//!
//! This module provides the durable half of the offline buffer:
//! - `AppendLog`: the append-only JSONL file and its atomic flush
//! - `Record`: the on-disk line format
//!
//! # Architecture
//!
//! ```text
//! Write Path:
//! ┌──────────┐    ┌────────────┐    ┌──────────────────────┐
//! │ record() │───►│ Serializer │───►│ append to buffer.log │
//! └──────────┘    └────────────┘    └──────────────────────┘
//!
//! Flush Path:
//! ┌────────────┐    ┌──────────────────┐    ┌──────────┐    ┌─────────────┐
//! │ Serializer │───►│ rename → .tmp    │───►│ read all │───►│ delete .tmp │
//! └────────────┘    └──────────────────┘    └──────────┘    └─────────────┘
//! ```

mod record;
mod store;

pub use record::Record;
pub use store::{AppendLog, TEMP_SUFFIX};
