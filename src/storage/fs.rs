//! Local file system storage

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use super::Storage;

/// Storage backed by `std::fs`
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl FsStorage {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for FsStorage {
    fn append_line(&self, path: &Path, line: &str) -> io::Result<()> {
        ensure_parent_dir(path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        // One write call per line so concurrent readers never see half a record
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        file.write_all(buf.as_bytes())
    }

    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        ensure_parent_dir(path)?;
        fs::write(path, contents)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn size(&self, path: &Path) -> io::Result<u64> {
        Ok(fs::metadata(path)?.len())
    }
}

fn ensure_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_creates_file_and_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("dir").join("buffer.log");

        let storage = FsStorage::new();
        storage.append_line(&path, "one").unwrap();
        storage.append_line(&path, "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
        assert_eq!(storage.size(&path).unwrap(), 8);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.log");
        let storage = FsStorage::new();

        let other = temp_dir.path().join("other.log");
        let not_found = io::ErrorKind::NotFound;

        assert_eq!(storage.read(&path).unwrap_err().kind(), not_found);
        assert_eq!(storage.remove(&path).unwrap_err().kind(), not_found);
        assert_eq!(storage.size(&path).unwrap_err().kind(), not_found);
        assert_eq!(storage.rename(&path, &other).unwrap_err().kind(), not_found);
    }

    #[test]
    fn test_rename_replaces_destination() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("from.log");
        let to = temp_dir.path().join("to.log");
        fs::write(&from, "new\n").unwrap();
        fs::write(&to, "old\n").unwrap();

        FsStorage::new().rename(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(fs::read_to_string(&to).unwrap(), "new\n");
    }

    #[test]
    fn test_read_returns_bytes_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("buffer.log");
        fs::write(&path, b"ok\n\xff\xfe\n").unwrap();

        assert_eq!(FsStorage::new().read(&path).unwrap(), b"ok\n\xff\xfe\n");
    }

    #[test]
    fn test_write_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("buffer.log");
        let storage = FsStorage::new();

        storage.write(&path, b"first version\n").unwrap();
        storage.write(&path, b"second\n").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second\n");
    }
}
