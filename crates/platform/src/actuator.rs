//! Timed two-line actuator drive.
//!
//! The actuator is a small DC motor behind an H-bridge: raising one line
//! drives forward, raising the other drives backward, both low brakes.
//! Drive calls are fire-and-forget — hold the direction for the requested
//! duration, then stop. There is no feedback path.

use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;

/// Fire-and-forget directional drive.
pub trait Actuator {
    /// Drive forward for `duration`, then stop.
    async fn forward(&mut self, duration: Duration);

    /// Drive backward for `duration`, then stop.
    async fn backward(&mut self, duration: Duration);

    /// Rock once: half of `duration` forward, half backward.
    async fn toggle(&mut self, duration: Duration) {
        let half = duration / 2;
        self.forward(half).await;
        self.backward(half).await;
    }
}

/// An H-bridge motor on two GPIO lines.
pub struct DualLineMotor<A, B> {
    line_a: A,
    line_b: B,
}

impl<A: OutputPin, B: OutputPin> DualLineMotor<A, B> {
    /// Take the two drive lines, leaving the motor stopped.
    pub fn new(mut line_a: A, mut line_b: B) -> Self {
        let _ = line_a.set_low();
        let _ = line_b.set_low();
        Self { line_a, line_b }
    }

    fn stop(&mut self) {
        let _ = self.line_a.set_low();
        let _ = self.line_b.set_low();
    }
}

impl<A: OutputPin, B: OutputPin> Actuator for DualLineMotor<A, B> {
    async fn forward(&mut self, duration: Duration) {
        let _ = self.line_a.set_high();
        let _ = self.line_b.set_low();
        Timer::after(duration).await;
        self.stop();
    }

    async fn backward(&mut self, duration: Duration) {
        let _ = self.line_b.set_high();
        let _ = self.line_a.set_low();
        Timer::after(duration).await;
        self.stop();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records every level change so tests can check the drive sequence.
    #[derive(Clone)]
    struct TracePin {
        id: char,
        trace: Rc<RefCell<Vec<(char, bool)>>>,
    }

    impl embedded_hal::digital::ErrorType for TracePin {
        type Error = core::convert::Infallible;
    }

    impl OutputPin for TracePin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.trace.borrow_mut().push((self.id, false));
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.trace.borrow_mut().push((self.id, true));
            Ok(())
        }
    }

    fn motor() -> (DualLineMotor<TracePin, TracePin>, Rc<RefCell<Vec<(char, bool)>>>) {
        let trace = Rc::new(RefCell::new(Vec::new()));
        let a = TracePin { id: 'a', trace: Rc::clone(&trace) };
        let b = TracePin { id: 'b', trace: Rc::clone(&trace) };
        (DualLineMotor::new(a, b), trace)
    }

    #[tokio::test]
    async fn forward_raises_a_then_stops_both() {
        let (mut motor, trace) = motor();
        trace.borrow_mut().clear();
        motor.forward(Duration::from_millis(5)).await;
        assert_eq!(
            *trace.borrow(),
            [('a', true), ('b', false), ('a', false), ('b', false)]
        );
    }

    #[tokio::test]
    async fn backward_raises_b_then_stops_both() {
        let (mut motor, trace) = motor();
        trace.borrow_mut().clear();
        motor.backward(Duration::from_millis(5)).await;
        assert_eq!(
            *trace.borrow(),
            [('b', true), ('a', false), ('a', false), ('b', false)]
        );
    }

    #[tokio::test]
    async fn toggle_rocks_forward_then_backward() {
        let (mut motor, trace) = motor();
        trace.borrow_mut().clear();
        motor.toggle(Duration::from_millis(10)).await;
        let first = trace.borrow().first().copied();
        let has_back = trace.borrow().iter().any(|&(id, high)| id == 'b' && high);
        assert_eq!(first, Some(('a', true)));
        assert!(has_back);
    }

    #[test]
    fn construction_leaves_motor_stopped() {
        let (_motor, trace) = motor();
        assert_eq!(*trace.borrow(), [('a', false), ('b', false)]);
    }
}
