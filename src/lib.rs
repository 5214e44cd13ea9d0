//! Off The Grid
//!
//! A local durability buffer for applications that may lose connectivity.
//! Payloads are appended to a JSON-lines log while the consumer is
//! unreachable and replayed in order once a caller-supplied condition says
//! it is reachable again. A log that grows past its size limit while
//! offline is discarded.
//!
//! # Modules
//!
//! - `serializer`: FIFO async lock guarding every log operation
//! - `storage`: whole-file storage trait and the file system backend
//! - `event_log`: append-only log with atomic drain
//! - `buffer`: the periodic replay/evict controller
//! - `error`: error types
//! - `utils`: utility functions (timestamps)
//!
//! # Example
//!
//! ```no_run
//! use off_the_grid::{BufferConfig, OfflineBuffer, OnlineFlag};
//! use serde_json::{json, Value};
//!
//! # async fn demo() -> off_the_grid::BufferResult<()> {
//! let online = OnlineFlag::new();
//! let buffer = OfflineBuffer::<Value>::builder(BufferConfig::new("offline.log"))
//!     .condition(online.clone())
//!     .on_record(|payload| println!("{payload}"))
//!     .start();
//!
//! buffer.record(&json!({"event": "click"})).await?;
//!
//! online.set_online();
//! buffer.tick().await?;
//! buffer.stop();
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod event_log;
pub mod serializer;
pub mod storage;
pub mod utils;

// Re-export commonly used items at crate root
pub use buffer::{
    BufferConfig, BufferState, BufferStats, Condition, OfflineBuffer, OnlineFlag, ReplayReport,
    TickOutcome,
};
pub use error::{BufferError, BufferResult};
pub use event_log::{AppendLog, Record};
pub use serializer::Serializer;
pub use storage::{FsStorage, Storage};
#[cfg(any(test, feature = "test-utils"))]
pub use storage::{MemoryStorage, StorageOp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
