//! Playback session — one open track plus its pause flag.
//!
//! Exactly one session exists at a time; opening a new one requires the
//! previous one fully closed. Open and close both touch the two buses and
//! keep the audited lock order: the storage mutex is taken, used, and
//! released before the decoder mutex inside each operation.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use platform::decoder::{DecoderControl, DecoderError};
use platform::storage::{Storage, StorageError};

/// Why a session failed to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenError {
    /// The track could not be opened on the medium.
    Storage(StorageError),
    /// The decoder refused stream setup.
    Decoder(DecoderError),
}

impl core::fmt::Display for OpenError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Decoder(e) => write!(f, "decoder: {e}"),
        }
    }
}

/// An open track streaming to the decoder.
pub struct PlaybackSession<F> {
    file: F,
    paused: AtomicBool,
}

impl<F> PlaybackSession<F> {
    /// Open the named track and prepare the decoder for a fresh stream.
    ///
    /// Storage first: open the file under the storage mutex and release it;
    /// only then take the decoder mutex for stream setup. A new session
    /// always starts unpaused.
    ///
    /// # Errors
    ///
    /// [`OpenError::Storage`] when the file cannot be opened,
    /// [`OpenError::Decoder`] when stream setup fails.
    pub async fn open<S, D>(
        storage: &Mutex<CriticalSectionRawMutex, S>,
        decoder: &Mutex<CriticalSectionRawMutex, D>,
        name: &str,
    ) -> Result<Self, OpenError>
    where
        S: Storage<File = F>,
        D: DecoderControl,
    {
        let file = {
            let mut medium = storage.lock().await;
            medium.open_file(name).await.map_err(OpenError::Storage)?
        };
        {
            let mut chip = decoder.lock().await;
            chip.begin_stream().map_err(OpenError::Decoder)?;
        }
        Ok(Self {
            file,
            paused: AtomicBool::new(false),
        })
    }

    /// Split into the streamer's file handle and the listener's pause flag.
    pub fn split(&mut self) -> (&mut F, &AtomicBool) {
        (&mut self.file, &self.paused)
    }

    /// Whether the session is currently paused.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    /// Close the track and quiet the decoder. Storage first, decoder after,
    /// mirroring the open path.
    pub async fn close<S, D>(
        self,
        storage: &Mutex<CriticalSectionRawMutex, S>,
        decoder: &Mutex<CriticalSectionRawMutex, D>,
    ) where
        S: Storage<File = F>,
        D: DecoderControl,
    {
        {
            let _medium = storage.lock().await;
            drop(self.file);
        }
        let mut chip = decoder.lock().await;
        if let Err(e) = chip.finish_stream() {
            log::warn!("decoder finish failed: {e}");
        }
    }
}
