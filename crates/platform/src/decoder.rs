//! Audio decoder chip boundary.
//!
//! The chip exposes two logical ports over the same physical bus:
//!
//! - the **control port** ([`DecoderControl`]) — register-level operations
//!   (volume, bass, mode, decode time) framed by the control chip select;
//! - the **data port** ([`DecoderDataPort`]) — the streaming path: a word
//!   transfer primitive framed by the data chip select, flow-controlled by a
//!   ready line the chip raises when it can accept more data.
//!
//! One object implements both; the player core serializes all access through
//! a single decoder mutex, so holding the mutex *is* holding the bus.

use embassy_time::Duration;

/// Errors reported by the decoder bus.
///
/// Transmission failures are best-effort territory: the streaming path logs
/// them and keeps going rather than halting playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecoderError {
    /// The transfer primitive reported a failure.
    Bus,
}

impl core::fmt::Display for DecoderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Bus => write!(f, "decoder bus transfer failed"),
        }
    }
}

/// Register-level control of the decoder chip.
pub trait DecoderControl {
    /// Initialise the chip: reset, clock setup, a sane starting volume.
    async fn init(&mut self) -> Result<(), DecoderError>;

    /// Set both channels to `volume` (0x00 loudest, 0xFE softest).
    fn set_volume(&mut self, volume: u8) -> Result<(), DecoderError>;

    /// Current volume of one channel (both are always written the same).
    fn volume(&mut self) -> Result<u8, DecoderError>;

    /// Set the bass enhancement level (0..=15).
    fn set_bass(&mut self, level: u8) -> Result<(), DecoderError>;

    /// Current bass enhancement level (0..=15).
    fn bass(&mut self) -> Result<u8, DecoderError>;

    /// Seconds of audio decoded since the stream began.
    fn decode_time(&mut self) -> Result<u16, DecoderError>;

    /// Prepare the chip for a fresh stream (mode, resync point, zeroed
    /// decode time). Called once per session before the first data word.
    fn begin_stream(&mut self) -> Result<(), DecoderError>;

    /// Tell the chip the stream is over so it can drain and go quiet.
    fn finish_stream(&mut self) -> Result<(), DecoderError>;
}

/// Streaming data port of the decoder chip.
pub trait DecoderDataPort {
    /// Whether the chip can accept more data right now (the DREQ line).
    fn ready(&mut self) -> bool;

    /// Assert the data chip select: words sent after this belong to one
    /// transfer frame.
    fn begin_transfer(&mut self);

    /// Deassert the data chip select, closing the transfer frame and
    /// letting the chip re-synchronise.
    fn end_transfer(&mut self);

    /// Send one 16-bit word of stream data within an open frame.
    fn send_word(&mut self, word: u16) -> Result<(), DecoderError>;
}

/// How long a hardware reset is held and settled, shared by driver
/// implementations.
pub const RESET_SETTLE: Duration = Duration::from_millis(2);
