//! Player cadence configuration.
//!
//! The reference cadence is what the hardware runs; tests construct a much
//! faster clock so scenarios finish in tens of milliseconds.

use embassy_time::Duration;

/// Timing knobs for the polling loops and bounded waits.
#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    /// How often the menu and the event listener poll the button latches.
    pub poll_interval: Duration,
    /// Settle delay before the first poll of a new playback session, so
    /// release bounce from the press that started the session is ignored.
    pub settle_delay: Duration,
    /// Bound on mutex waits issued from the event listener; a request that
    /// cannot acquire within this window is dropped.
    pub lock_timeout: Duration,
    /// How long an open-failure message stays on screen before rescanning.
    pub error_hold: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            settle_delay: Duration::from_millis(400),
            lock_timeout: Duration::from_millis(1000),
            error_hold: Duration::from_millis(2000),
        }
    }
}
