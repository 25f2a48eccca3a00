//! Track catalog — the scanned name list plus the wrapping current index.
//!
//! The catalog is rebuilt wholesale by each scan; there is no incremental
//! update. The index survives a rescan but is clamped to the new length.

use platform::storage::EntryName;

/// Upper bound on catalog size; a scan that finds more entries stops there.
pub const MAX_TRACKS: usize = 64;

/// Ordered track names with a wrapping cursor.
pub struct TrackCatalog {
    names: heapless::Vec<EntryName, MAX_TRACKS>,
    current: usize,
}

impl TrackCatalog {
    /// An empty catalog with the cursor at zero.
    pub const fn new() -> Self {
        Self {
            names: heapless::Vec::new(),
            current: 0,
        }
    }

    /// Drop the previous scan's names. The cursor is left alone until
    /// [`finish_scan`](Self::finish_scan) clamps it.
    pub fn begin_scan(&mut self) {
        self.names.clear();
    }

    /// Append an entry discovered by the scan.
    ///
    /// # Errors
    ///
    /// Returns the name back when the catalog is full.
    pub fn push(&mut self, name: EntryName) -> Result<(), EntryName> {
        self.names.push(name)
    }

    /// Clamp the cursor into the freshly scanned list.
    pub fn finish_scan(&mut self) {
        if self.current >= self.names.len() {
            self.current = 0;
        }
    }

    /// Number of tracks found by the last scan.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the last scan found nothing.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Zero-based cursor position.
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Name under the cursor, `None` on an empty catalog.
    pub fn current_name(&self) -> Option<&EntryName> {
        self.names.get(self.current)
    }

    /// Move the cursor forward one entry, wrapping past the end.
    // cursor < len <= MAX_TRACKS, so the increment cannot overflow
    #[allow(clippy::arithmetic_side_effects)]
    pub fn advance(&mut self) {
        if !self.names.is_empty() {
            self.current = (self.current + 1) % self.names.len();
        }
    }

    /// Move the cursor back one entry, wrapping past the start.
    // len >= 1 inside the branch, so len - 1 cannot underflow
    #[allow(clippy::arithmetic_side_effects)]
    pub fn retreat(&mut self) {
        if !self.names.is_empty() {
            if self.current == 0 {
                self.current = self.names.len() - 1;
            } else {
                self.current -= 1;
            }
        }
    }
}

impl Default for TrackCatalog {
    fn default() -> Self {
        Self::new()
    }
}
