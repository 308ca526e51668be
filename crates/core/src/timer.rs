//! High-resolution timer for frame timing.

use std::ops::{Add, AddAssign, Sub};
use std::time::{Duration, Instant};

/// A span of time in seconds, as consumed by the animation and controller code.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Timestep(f32);

impl Timestep {
    /// Zero-length step.
    pub const ZERO: Self = Self(0.0);

    /// Creates a timestep from seconds.
    #[inline]
    pub fn from_seconds(seconds: f32) -> Self {
        Self(seconds)
    }

    /// Length of the step in seconds.
    #[inline]
    pub fn seconds(self) -> f32 {
        self.0
    }

    /// Length of the step in milliseconds.
    #[inline]
    pub fn millis(self) -> f32 {
        self.0 * 1000.0
    }
}

impl From<Duration> for Timestep {
    fn from(duration: Duration) -> Self {
        Self(duration.as_secs_f32())
    }
}

impl Add for Timestep {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Timestep {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Timestep {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// High-resolution timer for measuring elapsed time.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the time elapsed since the last call to `tick()`.
    /// This is the delta time fed to the frame loop.
    pub fn tick(&mut self) -> Timestep {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        Timestep::from(delta)
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestep_units() {
        let step = Timestep::from_seconds(0.016);
        assert!((step.millis() - 16.0).abs() < 1e-4);
        assert_eq!(Timestep::from(Duration::from_millis(500)).seconds(), 0.5);
    }

    #[test]
    fn test_timestep_arithmetic() {
        let mut total = Timestep::ZERO;
        total += Timestep::from_seconds(1.5);
        total = total + Timestep::from_seconds(0.5);
        assert_eq!(total.seconds(), 2.0);
        assert_eq!((total - Timestep::from_seconds(2.0)).seconds(), 0.0);
    }

    #[test]
    fn test_tick_is_monotonic() {
        let mut timer = Timer::new();
        let first = timer.tick();
        let second = timer.tick();
        assert!(first.seconds() >= 0.0);
        assert!(second.seconds() >= 0.0);
        assert!(timer.elapsed() >= Duration::ZERO);
    }
}
