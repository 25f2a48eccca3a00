//! Hardware boundary contracts for the bassdeck playback controller.
//!
//! This crate defines trait-based abstractions for every peripheral the
//! player core touches, so the core can be developed and tested without
//! physical hardware.
//!
//! # Architecture Layers
//!
//! ```text
//! Player core (player crate)
//!         ↓
//! Platform contracts (this crate - trait abstractions)
//!         ↓
//! Hardware Layer (Embassy HAL + PAC)
//! ```
//!
//! # Contracts
//!
//! - [`irq`] - edge-interrupt dispatch with a fixed (bank, pin) callback table
//! - [`latch`] - single-slot saturating press mailboxes between ISR and task
//! - [`storage`] - directory enumeration and file reads with POSIX-like codes
//! - [`decoder`] - control and data ports of the audio decoder chip
//! - [`display`] - plain-text terminal output with cursor positioning
//! - [`actuator`] - timed two-line motor drive
//!
//! # Features
//!
//! - `std`: host-side implementations ([`storage_local`], [`mocks`])
//! - `defmt`: enable `defmt::Format` derives on public types

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(async_fn_in_trait)] // Embassy no_std: single-threaded, Send bounds not needed

pub mod actuator;
pub mod decoder;
pub mod display;
pub mod irq;
pub mod latch;
pub mod storage;
pub mod vs1053;

#[cfg(any(test, feature = "std"))]
pub mod mocks;
#[cfg(any(test, feature = "std"))]
pub mod storage_local;

// Re-export main boundary traits
pub use actuator::{Actuator, DualLineMotor};
pub use decoder::{DecoderControl, DecoderDataPort, DecoderError};
pub use display::TextDisplay;
pub use irq::{DispatchError, Edge, EdgeDispatcher, IsrCallback, PendingEdges, ServicedLine};
pub use latch::{ButtonSet, EventLatch};
pub use storage::{Directory, EntryName, File, Storage, StorageError, MAX_NAME_LEN};
