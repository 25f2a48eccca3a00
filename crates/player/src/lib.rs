//! Playback controller core — button-driven, interruptible streaming to an
//! external decoder chip.
#![cfg_attr(not(test), no_std)]
#![deny(clippy::unwrap_used)]
#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod controls;
pub mod player;
pub mod session;
pub mod streamer;

pub use catalog::{TrackCatalog, MAX_TRACKS};
pub use config::PlayerConfig;
pub use controls::{Actions, BassDir, ControlAction, ControlState, PressedSet, TrackStep};
pub use player::{BusMutex, FatalError, Phase, Player, SCAN_ROOT};
pub use session::{OpenError, PlaybackSession};
pub use streamer::{stream_to_decoder, BLOCK_SIZE};

// Tests come first — implementations below will make them pass
#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    /// Catalog cursor tests
    mod catalog_tests {
        use crate::catalog::TrackCatalog;
        use platform::storage::EntryName;

        fn catalog(names: &[&str]) -> TrackCatalog {
            let mut cat = TrackCatalog::new();
            cat.begin_scan();
            for name in names {
                let mut owned = EntryName::new();
                owned.push_str(name).unwrap();
                cat.push(owned).unwrap();
            }
            cat.finish_scan();
            cat
        }

        #[test]
        fn test_empty_catalog_has_no_current_name() {
            let cat = TrackCatalog::new();
            assert!(cat.is_empty());
            assert_eq!(cat.current_name(), None);
        }

        #[test]
        fn test_advance_wraps_past_the_end() {
            let mut cat = catalog(&["a", "b", "c"]);
            cat.advance();
            cat.advance();
            assert_eq!(cat.current_index(), 2);
            cat.advance();
            assert_eq!(cat.current_index(), 0);
        }

        #[test]
        fn test_retreat_wraps_past_the_start() {
            let mut cat = catalog(&["a", "b", "c"]);
            cat.retreat();
            assert_eq!(cat.current_index(), 2);
            cat.retreat();
            assert_eq!(cat.current_index(), 1);
        }

        #[test]
        fn test_full_cycle_returns_to_origin() {
            let mut cat = catalog(&["a", "b", "c", "d", "e"]);
            cat.advance();
            let origin = cat.current_index();
            for _ in 0..5 {
                cat.advance();
            }
            assert_eq!(cat.current_index(), origin);
            for _ in 0..5 {
                cat.retreat();
            }
            assert_eq!(cat.current_index(), origin);
        }

        #[test]
        fn test_single_entry_catalog_always_points_at_it() {
            let mut cat = catalog(&["only"]);
            cat.advance();
            assert_eq!(cat.current_index(), 0);
            cat.retreat();
            assert_eq!(cat.current_index(), 0);
            assert_eq!(cat.current_name().unwrap().as_str(), "only");
        }

        #[test]
        fn test_steps_on_empty_catalog_are_noops() {
            let mut cat = TrackCatalog::new();
            cat.advance();
            cat.retreat();
            assert_eq!(cat.current_index(), 0);
        }

        #[test]
        fn test_rescan_replaces_names_and_clamps_cursor() {
            let mut cat = catalog(&["a", "b", "c"]);
            cat.advance();
            cat.advance();
            assert_eq!(cat.current_index(), 2);
            // shrink to two entries: the old cursor would dangle
            cat.begin_scan();
            for name in ["x", "y"] {
                let mut owned = platform::storage::EntryName::new();
                owned.push_str(name).unwrap();
                cat.push(owned).unwrap();
            }
            cat.finish_scan();
            assert_eq!(cat.current_index(), 0);
            assert_eq!(cat.current_name().unwrap().as_str(), "x");
        }
    }

    /// Button/modifier decision-table tests
    mod controls_tests {
        use crate::controls::{
            BassDir, ControlAction, ControlState, PressedSet, TrackStep,
        };

        fn pressed(next: bool, previous: bool, select: bool, pause: bool) -> PressedSet {
            PressedSet {
                next,
                previous,
                select,
                pause,
            }
        }

        #[test]
        fn test_modifier_starts_set() {
            let state = ControlState::new();
            assert!(state.modifier());
        }

        #[test]
        fn test_no_presses_decide_nothing() {
            let mut state = ControlState::new();
            assert!(state.decide(PressedSet::default()).is_empty());
        }

        #[test]
        fn test_next_steps_track_when_modifier_set() {
            let mut state = ControlState::new();
            let actions = state.decide(pressed(true, false, false, false));
            assert_eq!(
                actions.as_slice(),
                [ControlAction::StepTrack(TrackStep::Forward)]
            );
        }

        #[test]
        fn test_previous_steps_back_when_modifier_set() {
            let mut state = ControlState::new();
            let actions = state.decide(pressed(false, true, false, false));
            assert_eq!(actions.as_slice(), [ControlAction::StepTrack(TrackStep::Back)]);
        }

        #[test]
        fn test_next_previous_nudge_bass_when_modifier_clear() {
            let mut state = ControlState::new();
            // clear the modifier
            state.decide(pressed(false, false, true, false));
            assert!(!state.modifier());
            let actions = state.decide(pressed(true, true, false, false));
            assert_eq!(
                actions.as_slice(),
                [
                    ControlAction::NudgeBass(BassDir::Up),
                    ControlAction::NudgeBass(BassDir::Down),
                ]
            );
        }

        #[test]
        fn test_select_toggles_modifier_both_ways() {
            let mut state = ControlState::new();
            let actions = state.decide(pressed(false, false, true, false));
            assert_eq!(actions.as_slice(), [ControlAction::ModifierChanged(false)]);
            let actions = state.decide(pressed(false, false, true, false));
            assert_eq!(actions.as_slice(), [ControlAction::ModifierChanged(true)]);
        }

        #[test]
        fn test_pause_toggles_pause_when_modifier_set() {
            let mut state = ControlState::new();
            let actions = state.decide(pressed(false, false, false, true));
            assert_eq!(actions.as_slice(), [ControlAction::TogglePause]);
        }

        #[test]
        fn test_pause_exits_when_modifier_clear_and_restores_modifier() {
            let mut state = ControlState::new();
            state.decide(pressed(false, false, true, false));
            let actions = state.decide(pressed(false, false, false, true));
            assert_eq!(
                actions.as_slice(),
                [
                    ControlAction::ModifierChanged(true),
                    ControlAction::ExitPlayback,
                ]
            );
            assert!(state.modifier());
        }

        #[test]
        fn test_step_reads_modifier_before_same_tick_select() {
            // Next and Select in one tick: Next still sees the old flag.
            let mut state = ControlState::new();
            let actions = state.decide(pressed(true, false, true, false));
            assert_eq!(
                actions.as_slice(),
                [
                    ControlAction::StepTrack(TrackStep::Forward),
                    ControlAction::ModifierChanged(false),
                ]
            );
        }

        #[test]
        fn test_pause_reads_modifier_after_same_tick_select() {
            // Select clears the flag first, so Pause in the same tick exits.
            let mut state = ControlState::new();
            let actions = state.decide(pressed(false, false, true, true));
            assert_eq!(
                actions.as_slice(),
                [
                    ControlAction::ModifierChanged(false),
                    ControlAction::ModifierChanged(true),
                    ControlAction::ExitPlayback,
                ]
            );
        }

        #[test]
        fn test_all_four_buttons_in_one_tick_all_processed() {
            let mut state = ControlState::new();
            let actions = state.decide(pressed(true, true, true, true));
            // Next, Previous with the old flag; Select toggles; Pause with
            // the new (clear) flag exits.
            assert_eq!(
                actions.as_slice(),
                [
                    ControlAction::StepTrack(TrackStep::Forward),
                    ControlAction::StepTrack(TrackStep::Back),
                    ControlAction::ModifierChanged(false),
                    ControlAction::ModifierChanged(true),
                    ControlAction::ExitPlayback,
                ]
            );
        }
    }

    /// Cadence configuration tests
    mod config_tests {
        use crate::config::PlayerConfig;
        use embassy_time::Duration;

        #[test]
        fn test_reference_cadence() {
            let config = PlayerConfig::default();
            assert_eq!(config.poll_interval, Duration::from_millis(100));
            assert_eq!(config.settle_delay, Duration::from_millis(400));
            assert_eq!(config.lock_timeout, Duration::from_millis(1000));
            assert_eq!(config.error_hold, Duration::from_millis(2000));
        }
    }
}
