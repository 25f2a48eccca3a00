//! Edge-interrupt dispatch.
//!
//! [`EdgeDispatcher`] maps (bank, pin) input lines to registered callbacks.
//! Arming a line selects its edges and stores one callback in a fixed
//! `[[Option<fn()>; PINS]; BANKS]` table — a bounded array, not a map, so
//! dispatch from interrupt context is allocation-free and O(1).
//!
//! On a hardware edge interrupt, [`EdgeDispatcher::service`] determines which
//! line fired by OR-ing the per-edge pending-status words and taking the
//! highest set bit with the count-leading-zeros primitive, invokes the
//! callback for that line, and then clears the pending bit exactly once.
//! A pending bit left set re-raises the interrupt immediately, so the clear
//! is part of the dispatch contract, not the caller's job.
//!
//! Callbacks run in interrupt context: they must not block or allocate. The
//! only legal operation inside one is a non-blocking `give` on an
//! [`EventLatch`](crate::latch::EventLatch).

/// Edge selection for an armed input line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Trigger on the rising edge only.
    Rising,
    /// Trigger on the falling edge only.
    Falling,
    /// Trigger on both edges.
    Both,
}

/// A bare function pointer invoked in interrupt context.
pub type IsrCallback = fn();

/// Errors returned by [`EdgeDispatcher::arm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// The (bank, pin) pair is outside the dispatcher's table.
    InvalidLine,
}

/// The line serviced by one [`EdgeDispatcher::service`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ServicedLine {
    /// Interrupt bank the line belongs to.
    pub bank: usize,
    /// Pin index within the bank.
    pub pin: u8,
}

/// Pending-status register boundary of the interrupt controller.
///
/// Implementations expose the raw per-edge pending words so the dispatcher
/// can locate and acknowledge the source line. `clear` must acknowledge the
/// line in both edge registers; acknowledging is what stops the interrupt
/// from re-raising.
pub trait PendingEdges {
    /// Bitmask of banks with at least one pending edge.
    fn pending_banks(&self) -> u32;
    /// Rising-edge pending word for `bank`.
    fn rising(&self, bank: usize) -> u32;
    /// Falling-edge pending word for `bank`.
    fn falling(&self, bank: usize) -> u32;
    /// Acknowledge the pending edge on (`bank`, `pin`).
    fn clear(&mut self, bank: usize, pin: u8);
}

/// Fixed-size edge-interrupt dispatch table.
///
/// `BANKS` and `PINS` bound the table at compile time; [`arm`] rejects lines
/// outside it. The dispatcher also tracks which edges each line is armed
/// for, so wiring code can program the controller's enable registers from
/// [`rising_armed`] / [`falling_armed`].
///
/// [`arm`]: EdgeDispatcher::arm
/// [`rising_armed`]: EdgeDispatcher::rising_armed
/// [`falling_armed`]: EdgeDispatcher::falling_armed
pub struct EdgeDispatcher<const BANKS: usize, const PINS: usize> {
    table: [[Option<IsrCallback>; PINS]; BANKS],
    rising_armed: [u32; BANKS],
    falling_armed: [u32; BANKS],
}

impl<const BANKS: usize, const PINS: usize> EdgeDispatcher<BANKS, PINS> {
    /// Create an empty dispatcher with no lines armed.
    pub const fn new() -> Self {
        Self {
            table: [[None; PINS]; BANKS],
            rising_armed: [0; BANKS],
            falling_armed: [0; BANKS],
        }
    }

    /// Register `callback` for the line and enable its edge-detect bits.
    ///
    /// A line holds one callback; re-arming replaces it and adds the new
    /// edge selection to the previous one.
    ///
    /// # Errors
    ///
    /// `DispatchError::InvalidLine` if `bank >= BANKS` or `pin >= PINS`.
    pub fn arm(
        &mut self,
        bank: usize,
        pin: u8,
        edge: Edge,
        callback: IsrCallback,
    ) -> Result<(), DispatchError> {
        let slot = self
            .table
            .get_mut(bank)
            .and_then(|b| b.get_mut(usize::from(pin)))
            .ok_or(DispatchError::InvalidLine)?;
        *slot = Some(callback);
        // Armed masks are 32 bits wide; a table wider than that still arms,
        // but only pins 0..32 appear in the enable masks.
        let bit = 1u32.checked_shl(u32::from(pin)).unwrap_or(0);
        if matches!(edge, Edge::Rising | Edge::Both) {
            // bank index validated by the table lookup above
            if let Some(mask) = self.rising_armed.get_mut(bank) {
                *mask |= bit;
            }
        }
        if matches!(edge, Edge::Falling | Edge::Both) {
            if let Some(mask) = self.falling_armed.get_mut(bank) {
                *mask |= bit;
            }
        }
        log::debug!("armed edge irq bank={bank} pin={pin} edge={edge:?}");
        Ok(())
    }

    /// Rising-edge enable mask for `bank` (for controller wiring).
    pub fn rising_armed(&self, bank: usize) -> u32 {
        self.rising_armed.get(bank).copied().unwrap_or(0)
    }

    /// Falling-edge enable mask for `bank` (for controller wiring).
    pub fn falling_armed(&self, bank: usize) -> u32 {
        self.falling_armed.get(bank).copied().unwrap_or(0)
    }

    /// Service one pending edge: locate the line, run its callback, clear
    /// the pending bit.
    ///
    /// Bank selection takes the lowest pending bank; within the bank the
    /// highest pending pin is serviced first (count-leading-zeros order).
    /// One call services exactly one line; the hardware re-raises the
    /// interrupt while further bits remain pending.
    ///
    /// A pending bit on a line with no registered callback is cleared
    /// without dispatch, so a spurious edge cannot storm the controller.
    ///
    /// Returns the serviced line, or `None` if nothing was pending.
    pub fn service<R: PendingEdges>(&self, regs: &mut R) -> Option<ServicedLine> {
        let banks = regs.pending_banks();
        if banks == 0 {
            return None;
        }
        let bank = banks.trailing_zeros() as usize;
        let status = regs.rising(bank) | regs.falling(bank);
        if status == 0 {
            return None;
        }
        // status != 0, so leading_zeros() <= 31 and the subtraction is exact.
        #[allow(clippy::arithmetic_side_effects)]
        let pin = (31 - status.leading_zeros()) as u8;
        let armed = self
            .table
            .get(bank)
            .and_then(|b| b.get(usize::from(pin)))
            .copied()
            .flatten();
        match armed {
            Some(callback) => callback(),
            None => log::warn!("spurious edge irq bank={bank} pin={pin}"),
        }
        // Cleared exactly once, after callback return. Skipping this clear
        // re-raises the interrupt immediately (busy storm).
        regs.clear(bank, pin);
        Some(ServicedLine { bank, pin })
    }
}

impl<const BANKS: usize, const PINS: usize> Default for EdgeDispatcher<BANKS, PINS> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};

    /// Software register file standing in for the interrupt controller.
    #[derive(Default)]
    struct FakeRegs {
        rising: [u32; 2],
        falling: [u32; 2],
        clears: usize,
    }

    impl PendingEdges for FakeRegs {
        fn pending_banks(&self) -> u32 {
            let mut banks = 0;
            for (i, (r, f)) in self.rising.iter().zip(self.falling.iter()).enumerate() {
                if r | f != 0 {
                    banks |= 1 << i;
                }
            }
            banks
        }

        fn rising(&self, bank: usize) -> u32 {
            self.rising[bank]
        }

        fn falling(&self, bank: usize) -> u32 {
            self.falling[bank]
        }

        fn clear(&mut self, bank: usize, pin: u8) {
            self.rising[bank] &= !(1 << pin);
            self.falling[bank] &= !(1 << pin);
            self.clears += 1;
        }
    }

    // One counter per test: the harness runs tests on parallel threads and
    // fn() callbacks can only reach statics.
    static HITS_SINGLE: AtomicUsize = AtomicUsize::new(0);
    static HITS_STORM: AtomicUsize = AtomicUsize::new(0);
    static HITS_SPURIOUS: AtomicUsize = AtomicUsize::new(0);

    fn count_hit() {}

    fn count_single() {
        HITS_SINGLE.fetch_add(1, Ordering::SeqCst);
    }

    fn count_storm() {
        HITS_STORM.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn arm_rejects_out_of_range_lines() {
        let mut d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        assert_eq!(d.arm(2, 0, Edge::Rising, count_hit), Err(DispatchError::InvalidLine));
        assert_eq!(d.arm(0, 32, Edge::Rising, count_hit), Err(DispatchError::InvalidLine));
        assert_eq!(d.arm(1, 31, Edge::Rising, count_hit), Ok(()));
    }

    #[test]
    fn arm_sets_edge_enable_masks() {
        let mut d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        d.arm(0, 5, Edge::Rising, count_hit).unwrap();
        d.arm(0, 7, Edge::Falling, count_hit).unwrap();
        d.arm(1, 3, Edge::Both, count_hit).unwrap();
        assert_eq!(d.rising_armed(0), 1 << 5);
        assert_eq!(d.falling_armed(0), 1 << 7);
        assert_eq!(d.rising_armed(1), 1 << 3);
        assert_eq!(d.falling_armed(1), 1 << 3);
    }

    #[test]
    fn service_invokes_callback_and_clears_once() {
        let mut d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        d.arm(0, 5, Edge::Rising, count_single).unwrap();
        let mut regs = FakeRegs::default();
        regs.rising[0] = 1 << 5;
        let line = d.service(&mut regs).unwrap();
        assert_eq!(line, ServicedLine { bank: 0, pin: 5 });
        assert_eq!(HITS_SINGLE.load(Ordering::SeqCst), 1);
        assert_eq!(regs.clears, 1);
        assert_eq!(regs.rising[0], 0);
        // Nothing pending now: a second service is a no-op.
        assert_eq!(d.service(&mut regs), None);
        assert_eq!(HITS_SINGLE.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn uncleared_pending_bit_redispatches_same_line() {
        // Model the busy-storm edge case: if the acknowledge were skipped,
        // the controller would re-enter service with the same bit set.
        struct StickyRegs(FakeRegs);
        impl PendingEdges for StickyRegs {
            fn pending_banks(&self) -> u32 {
                self.0.pending_banks()
            }
            fn rising(&self, bank: usize) -> u32 {
                self.0.rising(bank)
            }
            fn falling(&self, bank: usize) -> u32 {
                self.0.falling(bank)
            }
            fn clear(&mut self, _bank: usize, _pin: u8) {
                // broken acknowledge: bit stays set
                self.0.clears += 1;
            }
        }
        let mut d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        d.arm(0, 9, Edge::Falling, count_storm).unwrap();
        let mut regs = StickyRegs(FakeRegs::default());
        regs.0.falling[0] = 1 << 9;
        for _ in 0..3 {
            let line = d.service(&mut regs).unwrap();
            assert_eq!(line.pin, 9);
        }
        // The same line fired every time: that is the storm the real
        // acknowledge prevents.
        assert_eq!(HITS_STORM.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn highest_pin_serviced_first_within_a_bank() {
        let mut d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        d.arm(0, 2, Edge::Rising, count_hit).unwrap();
        d.arm(0, 30, Edge::Rising, count_hit).unwrap();
        let mut regs = FakeRegs::default();
        regs.rising[0] = (1 << 2) | (1 << 30);
        assert_eq!(d.service(&mut regs).unwrap().pin, 30);
        assert_eq!(d.service(&mut regs).unwrap().pin, 2);
        assert_eq!(d.service(&mut regs), None);
        assert_eq!(regs.clears, 2);
    }

    #[test]
    fn lowest_pending_bank_serviced_first() {
        let mut d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        d.arm(0, 1, Edge::Rising, count_hit).unwrap();
        d.arm(1, 1, Edge::Rising, count_hit).unwrap();
        let mut regs = FakeRegs::default();
        regs.rising[0] = 1 << 1;
        regs.rising[1] = 1 << 1;
        assert_eq!(d.service(&mut regs).unwrap().bank, 0);
        assert_eq!(d.service(&mut regs).unwrap().bank, 1);
    }

    #[test]
    fn button_press_flows_from_edge_to_latch() {
        use crate::latch::ButtonSet;
        static BUTTONS: ButtonSet = ButtonSet::new();
        fn next_isr() {
            BUTTONS.next.give();
        }
        let mut d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        d.arm(0, 7, Edge::Rising, next_isr).unwrap();
        let mut regs = FakeRegs::default();
        regs.rising[0] = 1 << 7;
        d.service(&mut regs).unwrap();
        // a second edge before the consumer polls coalesces into one event
        regs.rising[0] = 1 << 7;
        d.service(&mut regs).unwrap();
        assert!(BUTTONS.next.try_take());
        assert!(!BUTTONS.next.try_take());
    }

    #[test]
    fn spurious_unarmed_line_is_cleared_without_dispatch() {
        let d: EdgeDispatcher<2, 32> = EdgeDispatcher::new();
        let mut regs = FakeRegs::default();
        regs.falling[1] = 1 << 12;
        let line = d.service(&mut regs).unwrap();
        assert_eq!(line, ServicedLine { bank: 1, pin: 12 });
        assert_eq!(HITS_SPURIOUS.load(Ordering::SeqCst), 0);
        assert_eq!(regs.clears, 1);
        assert_eq!(d.service(&mut regs), None);
    }
}
