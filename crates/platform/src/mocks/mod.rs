//! Mock implementations of every platform contract for host testing.
//!
//! Each mock is a cheap [`Clone`] around shared interior state: tests keep
//! one clone for scripting and inspection while the player owns the other.
//! Storage reads carry a small simulated latency so streaming code hits a
//! real suspension point per block, the way it does on hardware.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::unwrap_used)] // lock poisoning in a test double is unrecoverable anyway

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;

use crate::actuator::Actuator;
use crate::decoder::{DecoderControl, DecoderDataPort, DecoderError};
use crate::display::TextDisplay;
use crate::storage::{Directory, EntryName, File, Storage, StorageError};
use crate::vs1053::{BASS_MAX, DEFAULT_VOLUME};

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Simulated per-block read latency, so streaming yields like real media.
const READ_LATENCY: Duration = Duration::from_millis(1);

#[derive(Default)]
struct StorageState {
    entries: Vec<(String, Arc<Vec<u8>>)>,
    fail_dir: bool,
    unopenable: Vec<String>,
    opens: Vec<String>,
}

/// In-memory [`Storage`] with failure injection.
#[derive(Clone, Default)]
pub struct MockStorage {
    state: Arc<Mutex<StorageState>>,
}

impl MockStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry with the given contents.
    pub fn add_entry(&self, name: &str, data: Vec<u8>) {
        self.state
            .lock()
            .unwrap()
            .entries
            .push((name.to_string(), Arc::new(data)));
    }

    /// Make every `open_dir` fail with an I/O error.
    pub fn fail_directory(&self) {
        self.state.lock().unwrap().fail_dir = true;
    }

    /// Make `open_file` on `name` fail with `NotFound`.
    pub fn fail_open(&self, name: &str) {
        self.state.lock().unwrap().unopenable.push(name.to_string());
    }

    /// Every file name passed to `open_file`, in order.
    pub fn opens(&self) -> Vec<String> {
        self.state.lock().unwrap().opens.clone()
    }
}

/// Directory listing over a [`MockStorage`] snapshot.
pub struct MockDir {
    names: Vec<String>,
    next: usize,
}

impl Directory for MockDir {
    async fn next_entry(&mut self) -> Result<Option<EntryName>, StorageError> {
        let Some(name) = self.names.get(self.next).cloned() else {
            return Ok(None);
        };
        self.next = self.next.saturating_add(1);
        let mut owned = EntryName::new();
        owned.push_str(&name).map_err(|_| StorageError::Io)?;
        Ok(Some(owned))
    }
}

/// An open in-memory file.
pub struct MockFile {
    data: Arc<Vec<u8>>,
    pos: usize,
}

impl File for MockFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        Timer::after(READ_LATENCY).await;
        let remaining = self.data.len().saturating_sub(self.pos);
        let n = remaining.min(buf.len());
        let end = self.pos.saturating_add(n);
        let (src, dst) = (self.data.get(self.pos..end), buf.get_mut(..n));
        if let (Some(src), Some(dst)) = (src, dst) {
            dst.copy_from_slice(src);
        }
        self.pos = end;
        Ok(n)
    }
}

impl Storage for MockStorage {
    type Dir = MockDir;
    type File = MockFile;

    async fn open_dir(&mut self, _path: &str) -> Result<Self::Dir, StorageError> {
        let state = self.state.lock().unwrap();
        if state.fail_dir {
            return Err(StorageError::Io);
        }
        Ok(MockDir {
            names: state.entries.iter().map(|(n, _)| n.clone()).collect(),
            next: 0,
        })
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, StorageError> {
        let mut state = self.state.lock().unwrap();
        state.opens.push(path.to_string());
        if state.unopenable.iter().any(|n| n == path) {
            return Err(StorageError::NotFound);
        }
        let data = state
            .entries
            .iter()
            .find(|(n, _)| n == path)
            .map(|(_, d)| Arc::clone(d))
            .ok_or(StorageError::NotFound)?;
        Ok(MockFile { data, pos: 0 })
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DecoderState {
    volume: u8,
    bass: u8,
    decode_time: u16,
    frames: Vec<Vec<u16>>,
    open_frame: Option<Vec<u16>>,
    streams_begun: usize,
    streams_finished: usize,
    /// Words sent while the ready line was low — must stay empty.
    not_ready_violations: usize,
    /// Words sent outside an open transfer frame — must stay empty.
    unframed_words: usize,
}

/// Scriptable decoder double: a register file plus a transfer-frame log.
#[derive(Clone)]
pub struct MockDecoder {
    state: Arc<Mutex<DecoderState>>,
    ready: Arc<AtomicBool>,
}

impl MockDecoder {
    /// Decoder that is ready from the start.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DecoderState {
                volume: DEFAULT_VOLUME,
                ..DecoderState::default()
            })),
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Drive the ready (DREQ) line from the test.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Seed the bass register.
    pub fn set_bass_direct(&self, level: u8) {
        self.state.lock().unwrap().bass = level & BASS_MAX;
    }

    /// Current bass register value.
    pub fn bass_value(&self) -> u8 {
        self.state.lock().unwrap().bass
    }

    /// Completed transfer frames, oldest first.
    pub fn frames(&self) -> Vec<Vec<u16>> {
        self.state.lock().unwrap().frames.clone()
    }

    /// Every word sent so far, flattened across frames.
    pub fn words(&self) -> Vec<u16> {
        self.state
            .lock()
            .unwrap()
            .frames
            .iter()
            .flatten()
            .copied()
            .collect()
    }

    /// Streams begun / finished so far.
    pub fn stream_counts(&self) -> (usize, usize) {
        let state = self.state.lock().unwrap();
        (state.streams_begun, state.streams_finished)
    }

    /// Words sent while not ready (flow-control violations).
    pub fn not_ready_violations(&self) -> usize {
        self.state.lock().unwrap().not_ready_violations
    }

    /// Words sent outside a transfer frame (framing violations).
    pub fn unframed_words(&self) -> usize {
        self.state.lock().unwrap().unframed_words
    }
}

impl Default for MockDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DecoderControl for MockDecoder {
    async fn init(&mut self) -> Result<(), DecoderError> {
        let mut state = self.state.lock().unwrap();
        state.volume = DEFAULT_VOLUME;
        Ok(())
    }

    fn set_volume(&mut self, volume: u8) -> Result<(), DecoderError> {
        self.state.lock().unwrap().volume = volume;
        Ok(())
    }

    fn volume(&mut self) -> Result<u8, DecoderError> {
        Ok(self.state.lock().unwrap().volume)
    }

    fn set_bass(&mut self, level: u8) -> Result<(), DecoderError> {
        self.state.lock().unwrap().bass = level & BASS_MAX;
        Ok(())
    }

    fn bass(&mut self) -> Result<u8, DecoderError> {
        Ok(self.state.lock().unwrap().bass)
    }

    fn decode_time(&mut self) -> Result<u16, DecoderError> {
        Ok(self.state.lock().unwrap().decode_time)
    }

    fn begin_stream(&mut self) -> Result<(), DecoderError> {
        let mut state = self.state.lock().unwrap();
        state.streams_begun = state.streams_begun.saturating_add(1);
        state.decode_time = 0;
        Ok(())
    }

    fn finish_stream(&mut self) -> Result<(), DecoderError> {
        let mut state = self.state.lock().unwrap();
        state.streams_finished = state.streams_finished.saturating_add(1);
        Ok(())
    }
}

impl DecoderDataPort for MockDecoder {
    fn ready(&mut self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn begin_transfer(&mut self) {
        let mut state = self.state.lock().unwrap();
        if state.open_frame.is_none() {
            state.open_frame = Some(Vec::new());
        }
    }

    fn end_transfer(&mut self) {
        let mut state = self.state.lock().unwrap();
        if let Some(frame) = state.open_frame.take() {
            if !frame.is_empty() {
                state.frames.push(frame);
            }
        }
    }

    fn send_word(&mut self, word: u16) -> Result<(), DecoderError> {
        let ready = self.ready.load(Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if !ready {
            state.not_ready_violations = state.not_ready_violations.saturating_add(1);
        }
        match state.open_frame.as_mut() {
            Some(frame) => frame.push(word),
            None => state.unframed_words = state.unframed_words.saturating_add(1),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

/// One recorded terminal operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermOp {
    /// Screen cleared.
    Clear,
    /// Cursor moved to (col, row).
    Cursor(u8, u8),
    /// Text written at the cursor.
    Text(String),
}

/// Terminal double recording every operation.
#[derive(Clone, Default)]
pub struct MockTerminal {
    ops: Arc<Mutex<Vec<TermOp>>>,
}

impl MockTerminal {
    /// Empty terminal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn ops(&self) -> Vec<TermOp> {
        self.ops.lock().unwrap().clone()
    }

    /// Whether any recorded text contains `needle`.
    pub fn saw_text(&self, needle: &str) -> bool {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .any(|op| matches!(op, TermOp::Text(t) if t.contains(needle)))
    }

    /// How many recorded texts contain `needle`.
    pub fn count_text(&self, needle: &str) -> usize {
        self.ops
            .lock()
            .unwrap()
            .iter()
            .filter(|op| matches!(op, TermOp::Text(t) if t.contains(needle)))
            .count()
    }
}

impl TextDisplay for MockTerminal {
    fn clear(&mut self) {
        self.ops.lock().unwrap().push(TermOp::Clear);
    }

    fn set_cursor(&mut self, col: u8, row: u8) {
        self.ops.lock().unwrap().push(TermOp::Cursor(col, row));
    }

    fn write_text(&mut self, text: &str) {
        self.ops.lock().unwrap().push(TermOp::Text(text.to_string()));
    }
}

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

/// A recorded actuator movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Forward drive for the given duration.
    Forward(Duration),
    /// Backward drive for the given duration.
    Backward(Duration),
}

/// Actuator double: records moves, sleeps a token millisecond per move so an
/// animation loop cannot starve its sibling futures.
#[derive(Clone, Default)]
pub struct MockActuator {
    moves: Arc<Mutex<Vec<Move>>>,
}

impl MockActuator {
    /// Idle actuator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves performed so far.
    pub fn moves(&self) -> Vec<Move> {
        self.moves.lock().unwrap().clone()
    }
}

impl Actuator for MockActuator {
    async fn forward(&mut self, duration: Duration) {
        self.moves.lock().unwrap().push(Move::Forward(duration));
        Timer::after(Duration::from_millis(1)).await;
    }

    async fn backward(&mut self, duration: Duration) {
        self.moves.lock().unwrap().push(Move::Backward(duration));
        Timer::after(Duration::from_millis(1)).await;
    }
}

// ---------------------------------------------------------------------------
// Indicator pin
// ---------------------------------------------------------------------------

/// Output-pin double recording every level change.
#[derive(Clone, Default)]
pub struct MockPin {
    levels: Arc<Mutex<Vec<bool>>>,
}

impl MockPin {
    /// Pin with no recorded levels.
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent level, if any was set.
    pub fn level(&self) -> Option<bool> {
        self.levels.lock().unwrap().last().copied()
    }

    /// Every level change, oldest first.
    pub fn history(&self) -> Vec<bool> {
        self.levels.lock().unwrap().clone()
    }
}

impl embedded_hal::digital::ErrorType for MockPin {
    type Error = core::convert::Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.lock().unwrap().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.lock().unwrap().push(true);
        Ok(())
    }
}
