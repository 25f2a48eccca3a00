//! Playback lifecycle — scan, menu, play, and the concurrent playing-phase
//! futures.
//!
//! Each phase is an async method on [`Player`]; [`Player::run`] is the
//! transition loop. The playing phase owns its three children — the
//! streamer, the event listener, and the idle animator — as futures inside
//! one `select3`: whichever resolves first decides the next phase and the
//! other two are torn down by drop before any successor starts. Async mutex
//! guards are RAII, so teardown can never leak a held bus lock.

use core::convert::Infallible;
use core::fmt::Write as _;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_futures::select::{select3, Either3};
use embassy_futures::yield_now;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::mutex::Mutex;
use embassy_time::{with_timeout, Duration, Timer};
use embedded_hal::digital::{OutputPin, PinState};

use platform::actuator::Actuator;
use platform::decoder::{DecoderControl, DecoderDataPort};
use platform::display::TextDisplay;
use platform::latch::ButtonSet;
use platform::storage::{Directory, Storage, StorageError};
use platform::vs1053::BASS_MAX;

use crate::catalog::TrackCatalog;
use crate::config::PlayerConfig;
use crate::controls::{BassDir, ControlAction, ControlState, PressedSet, TrackStep};
use crate::session::PlaybackSession;
use crate::streamer::stream_to_decoder;

/// The mutex flavor both bus guards use.
pub type BusMutex<T> = Mutex<CriticalSectionRawMutex, T>;

/// Directory scanned for tracks.
pub const SCAN_ROOT: &str = "/";

/// Display row the transport icon lives on.
const ICON_ROW: u8 = 7;
/// Transport icon while streaming.
const PLAY_ICON: &str = "> ";
/// Transport icon while paused.
const PAUSE_ICON: &str = "||";

// Idle animation stroke lengths.
const SWING_FORWARD: Duration = Duration::from_millis(300);
const SWING_BACK: Duration = Duration::from_millis(150);

/// Lifecycle phases. At most one is active; transitions happen in
/// [`Player::run`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Enumerate the medium and rebuild the catalog.
    Scan,
    /// Let the user pick a track.
    Menu,
    /// Stream the current track with the listener and animator alongside.
    Play,
}

/// Terminal failures: the player reports them on screen and halts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FatalError {
    /// The medium cannot be enumerated.
    Storage(StorageError),
    /// A scan completed but found nothing to play.
    NoTracks,
}

impl core::fmt::Display for FatalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage unreadable: {e}"),
            Self::NoTracks => write!(f, "no tracks found"),
        }
    }
}

/// How the playing phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlayOutcome {
    /// The stream reached end of track (or the medium failed mid-stream).
    Finished,
    /// The listener requested a restart at the new catalog index.
    Switch,
    /// The listener requested leaving playback.
    Exit,
}

/// The playback controller.
///
/// Owns the catalog, the control state, and the output peripherals; borrows
/// the two bus mutexes and the button latches, which outlive it (the
/// latches are given from interrupt callbacks).
pub struct Player<'a, S, D, T, A, P> {
    storage: &'a BusMutex<S>,
    decoder: &'a BusMutex<D>,
    buttons: &'a ButtonSet,
    display: T,
    indicator: P,
    actuator: A,
    catalog: TrackCatalog,
    controls: ControlState,
    config: PlayerConfig,
}

impl<'a, S, D, T, A, P> Player<'a, S, D, T, A, P>
where
    S: Storage,
    D: DecoderControl + DecoderDataPort,
    T: TextDisplay,
    A: Actuator,
    P: OutputPin,
{
    /// Wire up a player. The decoder is assumed initialised.
    pub fn new(
        storage: &'a BusMutex<S>,
        decoder: &'a BusMutex<D>,
        buttons: &'a ButtonSet,
        display: T,
        indicator: P,
        actuator: A,
        config: PlayerConfig,
    ) -> Self {
        Self {
            storage,
            decoder,
            buttons,
            display,
            indicator,
            actuator,
            catalog: TrackCatalog::new(),
            controls: ControlState::new(),
            config,
        }
    }

    /// Drive the lifecycle until a terminal failure.
    ///
    /// # Errors
    ///
    /// The only way out: [`FatalError`] from the scan phase.
    pub async fn run(&mut self) -> Result<Infallible, FatalError> {
        let _ = self
            .indicator
            .set_state(PinState::from(self.controls.modifier()));
        let mut phase = Phase::Scan;
        loop {
            log::debug!("entering phase {phase:?}");
            phase = match phase {
                Phase::Scan => {
                    self.scan().await?;
                    Phase::Menu
                }
                Phase::Menu => self.menu().await,
                Phase::Play => self.play().await,
            };
        }
    }

    /// Rebuild the catalog from the medium.
    async fn scan(&mut self) -> Result<(), FatalError> {
        log::info!("scanning {SCAN_ROOT}");
        self.catalog.begin_scan();
        {
            let mut medium = self.storage.lock().await;
            let mut dir = match medium.open_dir(SCAN_ROOT).await {
                Ok(dir) => dir,
                Err(e) => {
                    self.display.write_text("Cannot read storage!\n");
                    return Err(FatalError::Storage(e));
                }
            };
            loop {
                match dir.next_entry().await {
                    Ok(Some(name)) => {
                        if self.catalog.push(name).is_err() {
                            log::warn!("catalog full; remaining entries ignored");
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        self.display.write_text("Cannot read storage!\n");
                        return Err(FatalError::Storage(e));
                    }
                }
            }
        }
        self.catalog.finish_scan();
        log::info!("scan found {} tracks", self.catalog.len());
        if self.catalog.is_empty() {
            self.display.write_text("No tracks found\n");
            return Err(FatalError::NoTracks);
        }
        Ok(())
    }

    /// Track selection loop.
    async fn menu(&mut self) -> Phase {
        self.display.clear();
        self.display.write_text("Choose a song\n");
        loop {
            Timer::after(self.config.poll_interval).await;
            self.display.set_cursor(0, 1);
            if let Some(name) = self.catalog.current_name() {
                let mut line = heapless::String::<96>::new();
                // trailing spaces blank out any longer previous entry
                let _ = write!(line, "{name}               \n");
                self.display.write_text(&line);
            }
            if self.buttons.next.try_take() {
                self.catalog.advance();
            }
            if self.buttons.previous.try_take() {
                self.catalog.retreat();
            }
            if self.buttons.select.try_take() {
                return Phase::Play;
            }
            yield_now().await;
        }
    }

    /// One playback session, children included.
    async fn play(&mut self) -> Phase {
        let Some(name) = self.catalog.current_name() else {
            return Phase::Scan;
        };
        let name = name.clone();
        self.display.clear();
        let mut session =
            match PlaybackSession::open(self.storage, self.decoder, name.as_str()).await {
                Ok(session) => session,
                Err(e) => {
                    log::warn!("cannot start {name}: {e}");
                    let mut line = heapless::String::<96>::new();
                    let _ = write!(line, "Unable to play {name}\n");
                    self.display.write_text(&line);
                    Timer::after(self.config.error_hold).await;
                    return Phase::Scan;
                }
            };
        log::info!("playing {name}");
        {
            let mut line = heapless::String::<96>::new();
            let _ = write!(line, "Playing\n{name}\n");
            self.display.write_text(&line);
            self.display.set_cursor(0, ICON_ROW);
            self.display.write_text(PLAY_ICON);
            self.display.set_cursor(0, 0);
        }

        let (file, paused) = session.split();
        let outcome = {
            let stream = stream_to_decoder(file, self.storage, self.decoder, paused);
            let listen = listen_for_controls(
                self.buttons,
                &mut self.controls,
                &mut self.catalog,
                self.storage,
                self.decoder,
                &mut self.display,
                &mut self.indicator,
                paused,
                &self.config,
            );
            let animate = idle_animation(&mut self.actuator);
            match select3(stream, listen, animate).await {
                Either3::First(Ok(())) => {
                    log::info!("end of stream");
                    PlayOutcome::Finished
                }
                Either3::First(Err(e)) => {
                    log::warn!("stream aborted: {e}");
                    PlayOutcome::Finished
                }
                Either3::Second(outcome) => outcome,
                Either3::Third(infallible) => match infallible {},
            }
            // the two losing futures are dropped here, before close-down
        };
        session.close(self.storage, self.decoder).await;
        match outcome {
            PlayOutcome::Finished | PlayOutcome::Exit => Phase::Scan,
            PlayOutcome::Switch => Phase::Play,
        }
    }
}

/// The playback-phase button loop.
///
/// Waits out the settle delay, then drains the four latches once per poll
/// interval and applies every decoded action in order. Resolves when a
/// session transition is decided; everything else loops.
#[allow(clippy::too_many_arguments)]
async fn listen_for_controls<S, D, T, P>(
    buttons: &ButtonSet,
    controls: &mut ControlState,
    catalog: &mut TrackCatalog,
    storage: &BusMutex<S>,
    decoder: &BusMutex<D>,
    display: &mut T,
    indicator: &mut P,
    paused: &AtomicBool,
    config: &PlayerConfig,
) -> PlayOutcome
where
    D: DecoderControl,
    T: TextDisplay,
    P: OutputPin,
{
    // Let release bounce from the press that started the session die down.
    Timer::after(config.settle_delay).await;
    loop {
        Timer::after(config.poll_interval).await;
        let pressed = PressedSet::take_from(buttons);
        for action in controls.decide(pressed) {
            match action {
                ControlAction::StepTrack(step) => {
                    match step {
                        TrackStep::Forward => catalog.advance(),
                        TrackStep::Back => catalog.retreat(),
                    }
                    // Bounded wait for the medium: once the mutex is ours the
                    // streamer is not inside a read and teardown is clean. On
                    // timeout the transition is dropped, not queued.
                    match with_timeout(config.lock_timeout, storage.lock()).await {
                        Ok(_medium) => {
                            display.clear();
                            return PlayOutcome::Switch;
                        }
                        Err(_) => log::warn!("medium busy; track change dropped"),
                    }
                }
                ControlAction::NudgeBass(dir) => {
                    nudge_bass(decoder, dir, config.lock_timeout).await;
                }
                ControlAction::ModifierChanged(on) => {
                    let _ = indicator.set_state(PinState::from(on));
                }
                ControlAction::TogglePause => {
                    let now_paused = !paused.fetch_xor(true, Ordering::AcqRel);
                    display.set_cursor(0, ICON_ROW);
                    display.write_text(if now_paused { PAUSE_ICON } else { PLAY_ICON });
                }
                ControlAction::ExitPlayback => {
                    log::info!("leaving playback");
                    return PlayOutcome::Exit;
                }
            }
        }
        yield_now().await;
    }
}

/// Adjust the bass register by one step under the decoder mutex.
///
/// Saturates within the 4-bit hardware range. A bounded-wait timeout or a
/// bus error drops the request; playback is never disturbed.
async fn nudge_bass<D: DecoderControl>(
    decoder: &BusMutex<D>,
    dir: BassDir,
    lock_timeout: Duration,
) {
    let Ok(mut chip) = with_timeout(lock_timeout, decoder.lock()).await else {
        log::warn!("decoder busy; bass change dropped");
        return;
    };
    let level = match chip.bass() {
        Ok(level) => level,
        Err(e) => {
            log::warn!("bass read failed: {e}");
            return;
        }
    };
    let level = match dir {
        BassDir::Up => level.saturating_add(1).min(BASS_MAX),
        BassDir::Down => level.saturating_sub(1),
    };
    if let Err(e) = chip.set_bass(level) {
        log::warn!("bass write failed: {e}");
    } else {
        log::debug!("bass level now {level}");
    }
}

/// Decorative idle motion, independent of playback state. Never resolves.
async fn idle_animation<A: Actuator>(actuator: &mut A) -> Infallible {
    loop {
        actuator.forward(SWING_FORWARD).await;
        actuator.backward(SWING_BACK).await;
    }
}
