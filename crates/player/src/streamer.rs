//! Chunked, flow-controlled streaming from storage to the decoder.
//!
//! The stream moves in 32-byte blocks: each block is read under the storage
//! mutex (held only for the read), then sent as 2-byte big-endian words
//! inside one transfer frame under the decoder mutex. The decoder mutex is
//! reacquired per block, not per word, which bounds how long a competing
//! control operation (bass, volume) can be kept off the bus.
//!
//! While the chip's ready line is low or the session is paused, the sender
//! closes the transfer frame, releases the decoder mutex, yields, and
//! reacquires before re-checking — a stalled stream holds neither the bus
//! nor the mutex.
//!
//! A read shorter than the block size ends the stream; only the bytes
//! actually read are sent (an odd tail byte is padded with zero). Word
//! transfer errors are logged and skipped: a garbled word must not halt
//! playback.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use platform::decoder::DecoderDataPort;
use platform::storage::{File, StorageError};

/// Bytes read from the medium per block, and sent per transfer frame.
pub const BLOCK_SIZE: usize = 32;

/// Stream the whole file to the decoder, honoring flow control and pause.
///
/// Returns when a short read signals end of stream. The caller owns session
/// close-down; this function takes and releases the two bus mutexes per
/// block and never holds both at once.
///
/// # Errors
///
/// Propagates a [`StorageError`] if the medium fails mid-stream; bytes sent
/// so far are already with the decoder.
pub async fn stream_to_decoder<F, S, D>(
    file: &mut F,
    storage: &Mutex<CriticalSectionRawMutex, S>,
    decoder: &Mutex<CriticalSectionRawMutex, D>,
    paused: &AtomicBool,
) -> Result<(), StorageError>
where
    F: File,
    D: DecoderDataPort,
{
    let mut buf = [0u8; BLOCK_SIZE];
    loop {
        let n = {
            let _medium = storage.lock().await;
            file.read(&mut buf).await?
            // storage mutex released before any decoder work
        };
        if let Some(block) = buf.get(..n) {
            send_block(decoder, paused, block).await;
        }
        if n < BLOCK_SIZE {
            return Ok(());
        }
    }
}

/// Send one block as 16-bit words inside a single transfer frame.
async fn send_block<D>(
    decoder: &Mutex<CriticalSectionRawMutex, D>,
    paused: &AtomicBool,
    block: &[u8],
) where
    D: DecoderDataPort,
{
    if block.is_empty() {
        return;
    }
    let mut port = decoder.lock().await;
    port.begin_transfer();
    let mut words = block.chunks(2);
    let mut pending = words.next();
    while let Some(pair) = pending {
        if !port.ready() || paused.load(Ordering::Acquire) {
            // Stall: close the frame and give the bus away before yielding.
            port.end_transfer();
            drop(port);
            yield_now().await;
            port = decoder.lock().await;
            port.begin_transfer();
            continue;
        }
        let hi = pair.first().copied().unwrap_or(0);
        let lo = pair.get(1).copied().unwrap_or(0);
        if let Err(e) = port.send_word(u16::from_be_bytes([hi, lo])) {
            log::warn!("stream word dropped: {e}");
        }
        pending = words.next();
    }
    port.end_transfer();
}
