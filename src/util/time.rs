//! Clock sources for fire-control timing
//!
//! Every timestamp in the crate is a monotonic `f64` count of seconds since
//! the clock's origin. Weapons and timers in one server share a clock.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Monotonic seconds source
pub trait Clock: Send + Sync + fmt::Debug {
    /// Seconds elapsed since the clock's origin
    fn now(&self) -> f64;
}

/// Shared clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Clock backed by `tokio::time::Instant`
///
/// Follows tokio's virtual time when the runtime is paused, so it stays in
/// lockstep with `DebouncedTimer` deadlines in tests.
#[derive(Debug, Clone)]
pub struct TokioClock {
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    pub fn shared() -> SharedClock {
        Arc::new(Self::new())
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Hand-driven clock for replays and synchronous tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn shared(start: f64) -> Arc<Self> {
        Arc::new(Self::new(start))
    }

    /// Move time forward by `secs`
    pub fn advance(&self, secs: f64) {
        *self.now.lock() += secs.max(0.0);
    }

    pub fn set(&self, secs: f64) {
        let mut now = self.now.lock();
        // never run backwards
        if secs > *now {
            *now = secs;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }
}

/// Convert configured seconds into a timer delay
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_forward() {
        let clock = ManualClock::new(10.0);
        clock.advance(2.5);
        assert_eq!(clock.now(), 12.5);
        clock.advance(-1.0);
        assert_eq!(clock.now(), 12.5);
        clock.set(11.0);
        assert_eq!(clock.now(), 12.5);
        clock.set(20.0);
        assert_eq!(clock.now(), 20.0);
    }

    #[test]
    fn secs_to_duration_rejects_garbage() {
        assert_eq!(secs_to_duration(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
        assert_eq!(secs_to_duration(0.25), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_clock_follows_virtual_time() {
        let clock = TokioClock::new();
        assert_eq!(clock.now(), 0.0);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(clock.now(), 3.0);
    }
}
