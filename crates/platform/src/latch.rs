//! Single-slot press mailboxes between interrupt and task context.
//!
//! [`EventLatch`] is the signaling primitive behind every button: the edge
//! ISR calls [`give`](EventLatch::give), the polling task calls
//! [`try_take`](EventLatch::try_take) once per poll interval. The latch holds
//! at most one outstanding event — repeated gives before a take coalesce, so
//! rapid presses between polls are observed as a single press. This is a
//! deliberate contract, not a queue.
//!
//! Debounce is hardware edge selection plus a fixed settle delay before the
//! first poll of a new consumer; the latch itself does no timing.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;

/// A saturating single-slot event flag, safe to give from interrupt context.
pub struct EventLatch {
    inner: Signal<CriticalSectionRawMutex, ()>,
}

impl EventLatch {
    /// Create an empty latch. `const` so latches can live in `static`s
    /// reachable from `fn()` interrupt callbacks.
    pub const fn new() -> Self {
        Self {
            inner: Signal::new(),
        }
    }

    /// Record that the event occurred. Non-blocking, no allocation —
    /// the only primitive an interrupt callback may call. Saturates: a give
    /// on an already-given latch is a no-op.
    pub fn give(&self) {
        self.inner.signal(());
    }

    /// Consume the pending event, if any. Non-blocking.
    ///
    /// Returns `true` when at least one give happened since the last take.
    pub fn try_take(&self) -> bool {
        self.inner.try_take().is_some()
    }
}

impl Default for EventLatch {
    fn default() -> Self {
        Self::new()
    }
}

/// The four player buttons, one latch each.
///
/// Lives in a `static` next to the ISR callbacks that give into it; the
/// polling side consumes through a shared reference.
pub struct ButtonSet {
    /// Next-track / bass-up button.
    pub next: EventLatch,
    /// Previous-track / bass-down button.
    pub previous: EventLatch,
    /// Select / modifier-toggle button.
    pub select: EventLatch,
    /// Pause / exit button.
    pub pause: EventLatch,
}

impl ButtonSet {
    /// Create a set with no presses pending.
    pub const fn new() -> Self {
        Self {
            next: EventLatch::new(),
            previous: EventLatch::new(),
            select: EventLatch::new(),
            pause: EventLatch::new(),
        }
    }
}

impl Default for ButtonSet {
    fn default() -> Self {
        Self::new()
    }
}
