//! Storage abstraction — directory enumeration and sequential file reads.
//!
//! The player core needs exactly two things from the medium: list the names
//! in a directory, and read an open file block by block until a short read
//! signals end of stream. Result codes are POSIX-like and deliberately
//! coarse: a path either exists, or it does not, or the medium failed.
//!
//! Every call into an implementation must happen under the storage mutex
//! owned by the player core; the traits themselves carry no locking.

/// Maximum entry-name length the catalog stores.
pub const MAX_NAME_LEN: usize = 64;

/// A directory entry name.
pub type EntryName = heapless::String<MAX_NAME_LEN>;

/// Coarse POSIX-like storage result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StorageError {
    /// The path does not exist.
    NotFound,
    /// The medium failed (mount, transfer, or filesystem error).
    Io,
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Io => write!(f, "storage i/o error"),
        }
    }
}

/// Storage medium access.
pub trait Storage {
    /// Open directory type.
    type Dir: Directory;
    /// Open file type.
    type File: File;

    /// Open a directory for enumeration.
    async fn open_dir(&mut self, path: &str) -> Result<Self::Dir, StorageError>;

    /// Open a file for sequential reading.
    async fn open_file(&mut self, path: &str) -> Result<Self::File, StorageError>;
}

/// An open directory, enumerated entry by entry.
pub trait Directory {
    /// Next entry name, or `None` when the listing is exhausted.
    ///
    /// Entries whose names exceed [`MAX_NAME_LEN`] may be truncated or
    /// skipped by the implementation.
    async fn next_entry(&mut self) -> Result<Option<EntryName>, StorageError>;
}

/// An open file. Closing is dropping.
pub trait File {
    /// Read from the current position into `buf`.
    ///
    /// Returns the number of bytes actually transferred; fewer than
    /// `buf.len()` means the end of the stream has been reached.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;
}
