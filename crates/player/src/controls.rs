//! Combinatorial button logic for the playback phase.
//!
//! Four buttons, one modifier flag, eight meanings. `ControlState::decide`
//! is a pure function from "which latches fired this tick" to an ordered
//! action list — it does no I/O and holds no locks, so the whole truth
//! table is testable on the host.
//!
//! Evaluation order within a tick is fixed: Next, Previous, Select, Pause.
//! Every fired condition is processed, not just the first. Next/Previous
//! read the modifier as it was *before* a same-tick Select toggle; Pause
//! reads it *after* — callers relying on simultaneous-press fairness must
//! accept this precedence.

use platform::latch::ButtonSet;

/// Direction of a catalog step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackStep {
    /// Toward the next entry.
    Forward,
    /// Toward the previous entry.
    Back,
}

/// Direction of a bass adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BassDir {
    /// One level louder.
    Up,
    /// One level softer.
    Down,
}

/// One decoded control request, in tick order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControlAction {
    /// Step the catalog and restart the session at the new index.
    StepTrack(TrackStep),
    /// Nudge the bass register, leaving playback undisturbed.
    NudgeBass(BassDir),
    /// The modifier flag changed; mirror it to the indicator output.
    ModifierChanged(bool),
    /// Flip the session pause flag and redraw the transport icon.
    TogglePause,
    /// Leave the playback phase entirely.
    ExitPlayback,
}

/// Which latches fired in one polling tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PressedSet {
    /// Next button fired.
    pub next: bool,
    /// Previous button fired.
    pub previous: bool,
    /// Select button fired.
    pub select: bool,
    /// Pause button fired.
    pub pause: bool,
}

impl PressedSet {
    /// Drain all four latches once, in the fixed evaluation order.
    pub fn take_from(buttons: &ButtonSet) -> Self {
        Self {
            next: buttons.next.try_take(),
            previous: buttons.previous.try_take(),
            select: buttons.select.try_take(),
            pause: buttons.pause.try_take(),
        }
    }

    fn any(self) -> bool {
        self.next || self.previous || self.select || self.pause
    }
}

/// Upper bound on actions per tick: four buttons, Pause may emit two.
pub const MAX_ACTIONS: usize = 5;

/// Ordered actions decoded from one tick.
pub type Actions = heapless::Vec<ControlAction, MAX_ACTIONS>;

/// The modifier flag and the decision table around it.
///
/// The flag starts **set**: out of the box Next/Previous change tracks and
/// Pause pauses. Select inverts the whole table.
pub struct ControlState {
    modifier: bool,
}

impl ControlState {
    /// Initial state: modifier set.
    pub const fn new() -> Self {
        Self { modifier: true }
    }

    /// Current modifier flag.
    pub fn modifier(&self) -> bool {
        self.modifier
    }

    /// Decode one tick's presses into ordered actions, updating the
    /// modifier flag as Select and the exit path demand.
    pub fn decide(&mut self, pressed: PressedSet) -> Actions {
        let mut actions = Actions::new();
        if !pressed.any() {
            return actions;
        }
        if pressed.next {
            let action = if self.modifier {
                ControlAction::StepTrack(TrackStep::Forward)
            } else {
                ControlAction::NudgeBass(BassDir::Up)
            };
            let _ = actions.push(action);
        }
        if pressed.previous {
            let action = if self.modifier {
                ControlAction::StepTrack(TrackStep::Back)
            } else {
                ControlAction::NudgeBass(BassDir::Down)
            };
            let _ = actions.push(action);
        }
        if pressed.select {
            self.modifier = !self.modifier;
            let _ = actions.push(ControlAction::ModifierChanged(self.modifier));
        }
        if pressed.pause {
            if self.modifier {
                let _ = actions.push(ControlAction::TogglePause);
            } else {
                // Leaving playback restores the modifier to its default set
                // state, indicator included.
                self.modifier = true;
                let _ = actions.push(ControlAction::ModifierChanged(true));
                let _ = actions.push(ControlAction::ExitPlayback);
            }
        }
        actions
    }
}

impl Default for ControlState {
    fn default() -> Self {
        Self::new()
    }
}
