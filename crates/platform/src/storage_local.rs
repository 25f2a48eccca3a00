//! Local filesystem [`Storage`] implementation for host runs and tests.
//!
//! `LocalStorage` resolves all paths relative to the root it was constructed
//! with and maps `std::io` failures onto the coarse [`StorageError`] codes.

use std::fs;
use std::io::Read as _;
use std::path::PathBuf;

use crate::storage::{Directory, EntryName, File, Storage, StorageError};

fn map_io(err: &std::io::Error) -> StorageError {
    match err.kind() {
        std::io::ErrorKind::NotFound => StorageError::NotFound,
        _ => StorageError::Io,
    }
}

/// An open file on the local filesystem.
pub struct LocalFile {
    inner: fs::File,
}

impl File for LocalFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.inner.read(buf).map_err(|e| map_io(&e))
    }
}

/// An open directory listing on the local filesystem.
pub struct LocalDir {
    inner: fs::ReadDir,
}

impl Directory for LocalDir {
    async fn next_entry(&mut self) -> Result<Option<EntryName>, StorageError> {
        loop {
            let Some(entry) = self.inner.next() else {
                return Ok(None);
            };
            let entry = entry.map_err(|e| map_io(&e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                // non-UTF-8 name: skip, the catalog cannot hold it
                continue;
            };
            let mut owned = EntryName::new();
            if owned.push_str(name).is_err() {
                log::warn!("skipping over-long entry name ({} bytes)", name.len());
                continue;
            }
            return Ok(Some(owned));
        }
    }
}

/// A [`Storage`] implementation backed by `std::fs`.
///
/// # Example
/// ```no_run
/// # async fn example() {
/// use platform::storage_local::LocalStorage;
/// use platform::Storage;
/// let mut storage = LocalStorage::new("/home/user/music");
/// let file = storage.open_file("track.mp3").await.unwrap();
/// # }
/// ```
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a storage rooted at `root`.
    #[must_use]
    pub fn new(root: &str) -> Self {
        Self {
            root: PathBuf::from(root),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for LocalStorage {
    type Dir = LocalDir;
    type File = LocalFile;

    async fn open_dir(&mut self, path: &str) -> Result<Self::Dir, StorageError> {
        let full = self.resolve(path);
        let inner = fs::read_dir(&full).map_err(|e| map_io(&e))?;
        Ok(LocalDir { inner })
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, StorageError> {
        let full = self.resolve(path);
        let inner = fs::File::open(&full).map_err(|e| map_io(&e))?;
        Ok(LocalFile { inner })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_full_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("test.bin"), b"hello world").unwrap();
        let mut storage = LocalStorage::new(tmp.path().to_str().unwrap());
        let mut file = storage.open_file("test.bin").await.unwrap();
        let mut buf = [0u8; 32];
        let n = file.read(&mut buf).await.unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf[..n], b"hello world");
    }

    #[tokio::test]
    async fn short_read_signals_end_of_stream() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("blocks.bin"), vec![7u8; 40]).unwrap();
        let mut storage = LocalStorage::new(tmp.path().to_str().unwrap());
        let mut file = storage.open_file("blocks.bin").await.unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(file.read(&mut buf).await.unwrap(), 32);
        assert_eq!(file.read(&mut buf).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut storage = LocalStorage::new(tmp.path().to_str().unwrap());
        assert_eq!(
            storage.open_file("missing.mp3").await.err(),
            Some(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn missing_dir_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let mut storage = LocalStorage::new(tmp.path().to_str().unwrap());
        assert_eq!(
            storage.open_dir("nope").await.err(),
            Some(StorageError::NotFound)
        );
    }

    #[tokio::test]
    async fn directory_enumeration_yields_every_entry() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.mp3"), b"a").unwrap();
        fs::write(tmp.path().join("b.mp3"), b"b").unwrap();
        let mut storage = LocalStorage::new(tmp.path().to_str().unwrap());
        let mut dir = storage.open_dir("/").await.unwrap();
        let mut names = Vec::new();
        while let Some(name) = dir.next_entry().await.unwrap() {
            names.push(name.to_string());
        }
        names.sort();
        assert_eq!(names, ["a.mp3", "b.mp3"]);
    }
}
