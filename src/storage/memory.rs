//! In-memory storage with fault injection

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::Storage;

/// Storage operations that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageOp {
    Append,
    Read,
    Write,
    Rename,
    Remove,
    Size,
}

/// Storage kept in a map from path to content.
///
/// Operations listed with [`MemoryStorage::fail`] return an error until
/// [`MemoryStorage::heal`] is called.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: Mutex<HashMap<PathBuf, Vec<u8>>>,
    faults: Mutex<HashSet<StorageOp>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` fail from now on
    pub fn fail(&self, op: StorageOp) {
        self.faults.lock().insert(op);
    }

    /// Stop failing `op`
    pub fn heal(&self, op: StorageOp) {
        self.faults.lock().remove(&op);
    }

    /// Current content of `path` as text, if present
    pub fn contents(&self, path: &Path) -> Option<String> {
        self.files
            .lock()
            .get(path)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Whether `path` exists
    pub fn exists(&self, path: &Path) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Replace the content of `path`; any bytes, valid UTF-8 or not
    pub fn insert(&self, path: impl Into<PathBuf>, content: impl Into<Vec<u8>>) {
        self.files.lock().insert(path.into(), content.into());
    }

    fn check(&self, op: StorageOp) -> io::Result<()> {
        if self.faults.lock().contains(&op) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("injected {op:?} failure"),
            ));
        }
        Ok(())
    }

    fn not_found(path: &Path) -> io::Error {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file: {}", path.display()),
        )
    }
}

impl Storage for MemoryStorage {
    fn append_line(&self, path: &Path, line: &str) -> io::Result<()> {
        self.check(StorageOp::Append)?;
        let mut files = self.files.lock();
        let content = files.entry(path.to_path_buf()).or_default();
        content.extend_from_slice(line.as_bytes());
        content.push(b'\n');
        Ok(())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.check(StorageOp::Read)?;
        self.files
            .lock()
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        self.check(StorageOp::Write)?;
        self.files.lock().insert(path.to_path_buf(), contents.to_vec());
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.check(StorageOp::Rename)?;
        let mut files = self.files.lock();
        let content = files.remove(from).ok_or_else(|| Self::not_found(from))?;
        files.insert(to.to_path_buf(), content);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.check(StorageOp::Remove)?;
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(path))
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        self.check(StorageOp::Size)?;
        self.files
            .lock()
            .get(path)
            .map(|content| content.len() as u64)
            .ok_or_else(|| Self::not_found(path))
    }
}
