//! End-to-end player scenarios over the platform mocks.
//!
//! Each test wires a [`Player`] to mock peripherals, runs it against a
//! button script under a shortened cadence, then inspects the recorders.
//! The embassy std time driver provides the clock.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use core::sync::atomic::AtomicBool;

use embassy_futures::join::join;
use embassy_futures::select::{select, Either};
use embassy_sync::mutex::Mutex;
use embassy_time::{Duration, Timer};

use platform::latch::ButtonSet;
use platform::mocks::{MockActuator, MockDecoder, MockFile, MockPin, MockStorage, MockTerminal, Move};
use platform::storage::{Storage, StorageError};
use player::player::{BusMutex, FatalError, Player};
use player::streamer::stream_to_decoder;
use player::PlayerConfig;

fn fast_config() -> PlayerConfig {
    PlayerConfig {
        poll_interval: Duration::from_millis(10),
        settle_delay: Duration::from_millis(25),
        lock_timeout: Duration::from_millis(200),
        error_hold: Duration::from_millis(30),
    }
}

/// A mocked deck: shared handles left, player-owned clones right.
struct Rig {
    storage: MockStorage,
    decoder: MockDecoder,
    terminal: MockTerminal,
    actuator: MockActuator,
    led: MockPin,
    buttons: ButtonSet,
}

impl Rig {
    fn new(entries: &[(&str, usize)]) -> Self {
        let storage = MockStorage::new();
        for (name, size) in entries {
            storage.add_entry(name, vec![0x11; *size]);
        }
        Self {
            storage,
            decoder: MockDecoder::new(),
            terminal: MockTerminal::new(),
            actuator: MockActuator::new(),
            led: MockPin::new(),
            buttons: ButtonSet::new(),
        }
    }
}

/// Run the player against `script`; resolves when the script completes or
/// the player halts, whichever first. Returns the fatal error if any.
async fn drive(rig: &Rig, script: impl core::future::Future<Output = ()>) -> Option<FatalError> {
    let storage_bus: BusMutex<MockStorage> = Mutex::new(rig.storage.clone());
    let decoder_bus: BusMutex<MockDecoder> = Mutex::new(rig.decoder.clone());
    let mut player = Player::new(
        &storage_bus,
        &decoder_bus,
        &rig.buttons,
        rig.terminal.clone(),
        rig.led.clone(),
        rig.actuator.clone(),
        fast_config(),
    );
    match select(player.run(), script).await {
        Either::First(Err(e)) => Some(e),
        Either::First(Ok(never)) => match never {},
        Either::Second(()) => None,
    }
}

// A track long enough that streaming (1 ms simulated latency per 32-byte
// block) outlives every script below.
const LONG: usize = 64 * 1024;

#[tokio::test]
async fn menu_select_starts_playback() {
    let rig = Rig::new(&[("a.mp3", LONG)]);
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        Timer::after_millis(120).await;
    })
    .await;
    assert_eq!(fatal, None);
    assert!(rig.terminal.saw_text("Choose a song"));
    assert!(rig.terminal.saw_text("Playing"));
    assert!(rig.terminal.saw_text("a.mp3"));
    assert_eq!(rig.storage.opens(), ["a.mp3"]);
    let (begun, _) = rig.decoder.stream_counts();
    assert_eq!(begun, 1);
    // streaming respected flow control and framing throughout
    assert_eq!(rig.decoder.not_ready_violations(), 0);
    assert_eq!(rig.decoder.unframed_words(), 0);
    // the idle animation ran alongside, leading with the forward stroke
    let moves = rig.actuator.moves();
    assert_eq!(moves.first(), Some(&Move::Forward(Duration::from_millis(300))));
    assert!(moves.contains(&Move::Backward(Duration::from_millis(150))));
}

#[tokio::test]
async fn modifier_next_switches_track_and_wraps() {
    let rig = Rig::new(&[("a.mp3", LONG), ("b.mp3", LONG)]);
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        // wait out the menu handoff plus the listener settle delay
        Timer::after_millis(60).await;
        rig.buttons.next.give();
        Timer::after_millis(80).await;
        rig.buttons.next.give();
        Timer::after_millis(80).await;
    })
    .await;
    assert_eq!(fatal, None);
    // index 0 → 1 → wraps back to 0
    assert_eq!(rig.storage.opens(), ["a.mp3", "b.mp3", "a.mp3"]);
    let (begun, finished) = rig.decoder.stream_counts();
    assert_eq!(begun, 3);
    // every superseded session was closed before its successor opened
    assert_eq!(finished, 2);
    assert!(rig.terminal.saw_text("b.mp3"));
}

#[tokio::test]
async fn modifier_clear_previous_nudges_bass_without_restart() {
    let rig = Rig::new(&[("a.mp3", LONG)]);
    rig.decoder.set_bass_direct(5);
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        Timer::after_millis(60).await;
        // clear the modifier: next/previous now steer bass
        rig.buttons.select.give();
        Timer::after_millis(30).await;
        for _ in 0..5 {
            rig.buttons.previous.give();
            Timer::after_millis(30).await;
        }
    })
    .await;
    assert_eq!(fatal, None);
    assert_eq!(rig.decoder.bass_value(), 0);
    // playback was never disturbed: one open, one stream
    assert_eq!(rig.storage.opens(), ["a.mp3"]);
    let (begun, _) = rig.decoder.stream_counts();
    assert_eq!(begun, 1);
    // modifier indicator went dark when the flag cleared
    assert_eq!(rig.led.level(), Some(false));
}

#[tokio::test]
async fn bass_saturates_at_zero() {
    let rig = Rig::new(&[("a.mp3", LONG)]);
    rig.decoder.set_bass_direct(1);
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        Timer::after_millis(60).await;
        rig.buttons.select.give();
        Timer::after_millis(30).await;
        for _ in 0..3 {
            rig.buttons.previous.give();
            Timer::after_millis(30).await;
        }
    })
    .await;
    assert_eq!(fatal, None);
    assert_eq!(rig.decoder.bass_value(), 0);
}

#[tokio::test]
async fn pause_stops_the_stream_and_resume_continues_it() {
    let rig = Rig::new(&[("a.mp3", LONG)]);
    let counts = std::sync::Arc::new(std::sync::Mutex::new((0usize, 0usize)));
    let script_counts = std::sync::Arc::clone(&counts);
    let decoder = rig.decoder.clone();
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        Timer::after_millis(60).await;
        // modifier is set: pause toggles the session flag
        rig.buttons.pause.give();
        Timer::after_millis(30).await;
        let w1 = decoder.words().len();
        Timer::after_millis(60).await;
        let w2 = decoder.words().len();
        *script_counts.lock().unwrap() = (w1, w2);
        // release: streaming must pick up again within a poll or two
        rig.buttons.pause.give();
        Timer::after_millis(40).await;
    })
    .await;
    assert_eq!(fatal, None);
    let (w1, w2) = *counts.lock().unwrap();
    // no words crossed the bus while paused
    assert_eq!(w1, w2);
    // resumed after unpause
    assert!(rig.decoder.words().len() > w2);
    // the transport icon flipped to paused and back
    assert!(rig.terminal.saw_text("||"));
    assert!(rig.terminal.count_text("> ") >= 2);
}

#[tokio::test]
async fn modifier_clear_pause_exits_to_menu() {
    let rig = Rig::new(&[("a.mp3", LONG)]);
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        Timer::after_millis(60).await;
        rig.buttons.select.give();
        Timer::after_millis(30).await;
        rig.buttons.pause.give();
        Timer::after_millis(80).await;
    })
    .await;
    assert_eq!(fatal, None);
    // back through scan into the menu a second time
    assert!(rig.terminal.count_text("Choose a song") >= 2);
    // only the one session was ever opened
    assert_eq!(rig.storage.opens(), ["a.mp3"]);
    // exit restored the modifier indicator to its default lit state
    assert_eq!(rig.led.level(), Some(true));
    let (_, finished) = rig.decoder.stream_counts();
    assert_eq!(finished, 1);
}

#[tokio::test]
async fn unopenable_track_reports_then_rescans() {
    let rig = Rig::new(&[("bad.mp3", 64)]);
    rig.storage.fail_open("bad.mp3");
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        Timer::after_millis(150).await;
    })
    .await;
    assert_eq!(fatal, None);
    assert!(rig.terminal.saw_text("Unable to play bad.mp3"));
    // error hold expired and the player went back through scan to the menu
    assert!(rig.terminal.count_text("Choose a song") >= 2);
    let (begun, _) = rig.decoder.stream_counts();
    assert_eq!(begun, 0);
}

#[tokio::test]
async fn unreadable_medium_halts_with_message() {
    let rig = Rig::new(&[]);
    rig.storage.fail_directory();
    let fatal = drive(&rig, async {
        Timer::after_millis(200).await;
    })
    .await;
    assert_eq!(fatal, Some(FatalError::Storage(StorageError::Io)));
    assert!(rig.terminal.saw_text("Cannot read storage!"));
}

#[tokio::test]
async fn empty_catalog_halts() {
    let rig = Rig::new(&[]);
    let fatal = drive(&rig, async {
        Timer::after_millis(200).await;
    })
    .await;
    assert_eq!(fatal, Some(FatalError::NoTracks));
    assert!(rig.terminal.saw_text("No tracks found"));
}

#[tokio::test]
async fn short_track_plays_to_end_and_rescans() {
    // 40 bytes: one full block, one 8-byte tail — exercises end of stream
    let rig = Rig::new(&[("tiny.mp3", 40)]);
    let fatal = drive(&rig, async {
        rig.buttons.select.give();
        Timer::after_millis(120).await;
    })
    .await;
    assert_eq!(fatal, None);
    // 40 bytes = 20 words reached the decoder, then the session closed
    assert_eq!(rig.decoder.words().len(), 20);
    let (begun, finished) = rig.decoder.stream_counts();
    assert_eq!((begun, finished), (1, 1));
    // end of stream sends the player back through scan into the menu
    assert!(rig.terminal.count_text("Choose a song") >= 2);
}

// ---------------------------------------------------------------------------
// Streaming-protocol properties, driven without the full player
// ---------------------------------------------------------------------------

async fn open_mock_file(storage: &MockStorage, name: &str) -> MockFile {
    storage.clone().open_file(name).await.unwrap()
}

#[tokio::test]
async fn no_words_cross_while_ready_is_low() {
    let storage = MockStorage::new();
    storage.add_entry("t.bin", vec![0xAB; 64]);
    let decoder = MockDecoder::new();
    decoder.set_ready(false);
    let storage_bus: BusMutex<MockStorage> = Mutex::new(storage.clone());
    let decoder_bus: BusMutex<MockDecoder> = Mutex::new(decoder.clone());
    let paused = AtomicBool::new(false);

    let mut file = open_mock_file(&storage, "t.bin").await;
    let stream = stream_to_decoder(&mut file, &storage_bus, &decoder_bus, &paused);
    let script = async {
        Timer::after_millis(50).await;
        assert_eq!(decoder.words().len(), 0);
        decoder.set_ready(true);
    };
    let (res, ()) = join(stream, script).await;
    res.unwrap();
    assert_eq!(decoder.words().len(), 32);
    assert_eq!(decoder.not_ready_violations(), 0);
    assert_eq!(decoder.unframed_words(), 0);
}

#[tokio::test]
async fn concurrent_streams_never_interleave_within_a_frame() {
    let storage = MockStorage::new();
    storage.add_entry("aa.bin", vec![0xAA; 2048]);
    storage.add_entry("bb.bin", vec![0xBB; 2048]);
    let decoder = MockDecoder::new();
    let storage_bus: BusMutex<MockStorage> = Mutex::new(storage.clone());
    let decoder_bus: BusMutex<MockDecoder> = Mutex::new(decoder.clone());
    let paused_a = AtomicBool::new(false);
    let paused_b = AtomicBool::new(false);

    let mut file_a = open_mock_file(&storage, "aa.bin").await;
    let mut file_b = open_mock_file(&storage, "bb.bin").await;
    let (ra, rb) = join(
        stream_to_decoder(&mut file_a, &storage_bus, &decoder_bus, &paused_a),
        stream_to_decoder(&mut file_b, &storage_bus, &decoder_bus, &paused_b),
    )
    .await;
    ra.unwrap();
    rb.unwrap();

    let frames = decoder.frames();
    assert!(!frames.is_empty());
    for frame in &frames {
        let first = frame.first().copied().unwrap();
        assert!(
            frame.iter().all(|&w| w == first),
            "words from two streams interleaved inside one transfer frame"
        );
    }
    // both full payloads arrived
    let total: usize = frames.iter().map(Vec::len).sum();
    assert_eq!(total, 2048);
}
