use std::cell::Cell;

use foundation::time::Time;

/// Monotonic time source, sampled once per frame.
pub trait Clock {
    fn now(&self) -> Time;
}

/// Hand-driven clock for deterministic tests and headless runs.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_s: Cell<f64>,
}

impl ManualClock {
    pub fn new(start_s: f64) -> Self {
        Self {
            now_s: Cell::new(start_s),
        }
    }

    pub fn advance(&self, dt_s: f64) {
        self.now_s.set(self.now_s.get() + dt_s.max(0.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Time {
        Time(self.now_s.get())
    }
}

/// `std::time::Instant` backed clock. Not available on wasm32, where the host
/// supplies `performance.now()` instead.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug)]
pub struct MonotonicClock {
    origin: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for MonotonicClock {
    fn now(&self) -> Time {
        Time(self.origin.elapsed().as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::{Clock, ManualClock};
    use foundation::time::Time;

    #[test]
    fn manual_clock_never_goes_backwards() {
        let clock = ManualClock::new(1.0);
        clock.advance(0.5);
        clock.advance(-3.0);
        assert_eq!(clock.now(), Time(1.5));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn monotonic_clock_is_non_decreasing() {
        let clock = super::MonotonicClock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
