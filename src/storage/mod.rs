//! Storage collaborator
//!
//! The log only needs a handful of whole-file operations from its backing
//! store. They are synchronous; the log runs them on tokio's blocking pool.
//!
//! - `FsStorage`: the local file system
//! - `MemoryStorage`: an in-process map with fault injection, only built for
//!   tests or with the `test-utils` feature

mod fs;
#[cfg(any(test, feature = "test-utils"))]
mod memory;

use std::io;
use std::path::Path;

pub use fs::FsStorage;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryStorage, StorageOp};

/// Byte-addressable hierarchical file store.
///
/// Missing files must be reported as [`io::ErrorKind::NotFound`] so callers
/// can tell them apart from real failures.
pub trait Storage: Send + Sync + 'static {
    /// Append `line` plus a trailing `\n`, creating the file if absent
    fn append_line(&self, path: &Path, line: &str) -> io::Result<()>;

    /// Read the whole file as raw bytes
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Replace the file with `contents`, creating it if absent
    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Move `from` to `to`, replacing `to` if it exists
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Delete a file
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Size of a file in bytes
    fn size(&self, path: &Path) -> io::Result<u64>;
}

/// Treat a missing file as `default`
pub(crate) fn or_not_found<T>(result: io::Result<T>, default: T) -> io::Result<T> {
    match result {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(default),
        other => other,
    }
}
