//! Append-only log
//!
//! `AppendLog` owns one canonical file path. Every operation on it runs
//! through a single [`Serializer`], so operations happen one at a time and
//! in the order they were submitted.
//!
//! # Flush protocol
//!
//! ```text
//! <path>  ──rename──►  <path>.tmp  ──read──►  content  ──delete .tmp──►  done
//! ```
//!
//! Appends submitted after a flush queue behind it and start writing only
//! once the old content has been relocated, so they land in a fresh
//! canonical file and never in the content being drained.
//!
//! Content is read as bytes and decoded lossily. Invalid UTF-8 turns into
//! replacement characters on its own line and never fails the whole drain.
//!
//! # Recovery
//!
//! A flush that dies between the rename and the delete leaves content at
//! `<path>.tmp`. Before the next flush (and at startup, via
//! [`AppendLog::recover`]) that content is written together with the
//! canonical file into `<path>.fold`, which then replaces the canonical
//! file in one rename. A fold interrupted at any step can simply be run
//! again without duplicating records.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::record::Record;
use crate::error::{BufferError, BufferResult};
use crate::serializer::Serializer;
use crate::storage::{or_not_found, FsStorage, Storage};

/// Suffix of the temporary path that holds content during a flush
pub const TEMP_SUFFIX: &str = "tmp";

/// Suffix of the scratch file a recovery writes before replacing the log
const FOLD_SUFFIX: &str = "fold";

/// The append-only log
pub struct AppendLog {
    path: PathBuf,
    temp_path: PathBuf,
    fold_path: PathBuf,
    storage: Arc<dyn Storage>,
    serializer: Arc<Serializer>,
    flushing: Arc<AtomicBool>,
}

impl AppendLog {
    /// Open a log on the local file system
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self::with_storage(path, Arc::new(FsStorage::new()))
    }

    /// Open a log on custom storage
    pub fn with_storage<P: AsRef<Path>>(path: P, storage: Arc<dyn Storage>) -> Self {
        let path = path.as_ref().to_path_buf();
        let temp_path = sibling_path(&path, TEMP_SUFFIX);
        let fold_path = sibling_path(&path, FOLD_SUFFIX);

        Self {
            path,
            temp_path,
            fold_path,
            storage,
            serializer: Arc::new(Serializer::new()),
            flushing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Canonical log path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path that holds the content while a flush is in progress
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Whether a flush is running right now
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::SeqCst)
    }

    /// Append one record holding `data`.
    ///
    /// The record is encoded before it joins the queue, so an unencodable
    /// payload fails fast with [`BufferError::Serialization`]. Storage
    /// failures surface as [`BufferError::Io`] and are not retried.
    pub async fn append<T: Serialize + ?Sized>(&self, data: &T) -> BufferResult<()> {
        let line = Record::new(data).to_json_line()?;
        let (storage, path) = (Arc::clone(&self.storage), self.path.clone());

        self.serialized(move || storage.append_line(&path, &line))
            .await
    }

    /// Atomically take all current content and reset the log to empty.
    ///
    /// Returns the content, or an empty string if there is no log file.
    /// Bytes that are not valid UTF-8 come back as `U+FFFD`.
    pub async fn flush(&self) -> BufferResult<String> {
        let storage = Arc::clone(&self.storage);
        let flushing = Arc::clone(&self.flushing);
        let paths = self.paths();

        let content = self
            .serialized(move || {
                flushing.store(true, Ordering::SeqCst);
                let result = relocate_and_drain(storage.as_ref(), &paths);
                flushing.store(false, Ordering::SeqCst);
                result
            })
            .await?;

        debug!(path = %self.path.display(), bytes = content.len(), "flushed log");
        Ok(content)
    }

    /// Delete the log if it is larger than `limit_bytes`.
    ///
    /// Content stranded at the temporary path by an interrupted flush counts
    /// toward the size and is deleted with it. Returns `true` if anything
    /// was deleted. A missing file counts as empty.
    pub async fn evict_if_oversized(&self, limit_bytes: u64) -> BufferResult<bool> {
        let storage = Arc::clone(&self.storage);
        let (path, temp_path) = (self.path.clone(), self.temp_path.clone());

        let evicted_size = self
            .serialized(move || {
                let size = or_not_found(storage.size(&path), 0)?
                    + or_not_found(storage.size(&temp_path), 0)?;
                if size <= limit_bytes {
                    return Ok(None);
                }
                or_not_found(storage.remove(&path), ())?;
                or_not_found(storage.remove(&temp_path), ())?;
                Ok(Some(size))
            })
            .await?;

        match evicted_size {
            Some(size) => {
                info!(
                    path = %self.path.display(),
                    size,
                    limit = limit_bytes,
                    "log exceeded size limit, discarded"
                );
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Current size of the log in bytes (0 if absent)
    pub async fn size(&self) -> BufferResult<u64> {
        let (storage, path) = (Arc::clone(&self.storage), self.path.clone());
        self.serialized(move || or_not_found(storage.size(&path), 0))
            .await
    }

    /// Fold content left at the temporary path by an interrupted flush back
    /// into the log, ahead of anything appended since.
    ///
    /// Returns `true` if there was something to recover.
    pub async fn recover(&self) -> BufferResult<bool> {
        let storage = Arc::clone(&self.storage);
        let paths = self.paths();

        let recovered = self
            .serialized(move || fold_stale_temp(storage.as_ref(), &paths))
            .await?;

        if recovered {
            warn!(path = %self.path.display(), "recovered content from an interrupted flush");
        }
        Ok(recovered)
    }

    fn paths(&self) -> LogPaths {
        LogPaths {
            canonical: self.path.clone(),
            temp: self.temp_path.clone(),
            fold: self.fold_path.clone(),
        }
    }

    async fn serialized<F, R>(&self, work: F) -> BufferResult<R>
    where
        F: FnOnce() -> io::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let result = self
            .serializer
            .run_blocking(work)
            .await
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        result.map_err(BufferError::from)
    }
}

impl std::fmt::Debug for AppendLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppendLog")
            .field("path", &self.path)
            .field("flushing", &self.is_flushing())
            .finish()
    }
}

/// The three files one log works with
struct LogPaths {
    canonical: PathBuf,
    temp: PathBuf,
    fold: PathBuf,
}

/// `<path>.<suffix>`, keeping any existing extension (`buffer.log` → `buffer.log.tmp`)
fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn relocate_and_drain(storage: &dyn Storage, paths: &LogPaths) -> io::Result<String> {
    // A previous flush may have died after relocating; keep its content
    fold_stale_temp(storage, paths)?;

    match storage.rename(&paths.canonical, &paths.temp) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(String::new()),
        Err(e) => return Err(e),
    }

    let content = storage.read(&paths.temp)?;
    storage.remove(&paths.temp)?;
    Ok(decode_lossy(content))
}

fn decode_lossy(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

fn fold_stale_temp(storage: &dyn Storage, paths: &LogPaths) -> io::Result<bool> {
    let mut stale = match storage.read(&paths.temp) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    // Terminate a torn final line so it cannot swallow the next record
    if !stale.is_empty() && !stale.ends_with(b"\n") {
        stale.push(b'\n');
    }

    let current = or_not_found(storage.read(&paths.canonical), Vec::new())?;

    // Already folded by an attempt that failed only to delete the temp file
    if !current.starts_with(&stale) {
        let mut combined = stale;
        combined.extend_from_slice(&current);
        storage.write(&paths.fold, &combined)?;
        storage.rename(&paths.fold, &paths.canonical)?;
    }
    storage.remove(&paths.temp)?;

    Ok(true)
}
