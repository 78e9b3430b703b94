//! Fixed-delay reminders and cooldown gates built on `DebouncedTimer`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::DebouncedTimer;

/// How long a grief alert for one player suppresses the next one
pub const GRIEF_ALERT_COOLDOWN: Duration = Duration::from_secs(10);

/// Delayed notification with a fixed delay
///
/// Restarting postpones the reminder, so a player who keeps triggering it
/// only hears it once things settle.
#[derive(Debug)]
pub struct Nag {
    delay: Duration,
    timer: DebouncedTimer,
}

impl Nag {
    pub fn new<F>(delay: Duration, action: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            delay,
            timer: DebouncedTimer::new(action),
        }
    }

    pub fn start_or_reset(&mut self) {
        self.timer.start_or_reset(self.delay);
    }

    pub fn stop(&mut self) {
        self.timer.stop();
    }

    pub fn is_active(&self) -> bool {
        self.timer.is_active()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// Flag that stays raised for a fixed window after being triggered
#[derive(Debug)]
pub struct CooldownGate {
    window: Duration,
    cooling: Arc<AtomicBool>,
    timer: DebouncedTimer,
}

impl CooldownGate {
    pub fn new(window: Duration) -> Self {
        let cooling = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&cooling);
        Self {
            window,
            cooling,
            timer: DebouncedTimer::new(move || flag.store(false, Ordering::Release)),
        }
    }

    /// Raise the gate unless it is already raised
    ///
    /// Returns true when the caller may act (the gate was down). Repeated
    /// triggers while cooling do not extend the window.
    pub fn try_trigger(&mut self) -> bool {
        if self.cooling.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.timer.start_or_reset(self.window);
        true
    }

    pub fn is_cooling(&self) -> bool {
        self.cooling.load(Ordering::Acquire)
    }

    /// Drop the gate immediately
    pub fn clear(&mut self) {
        self.timer.stop();
        self.cooling.store(false, Ordering::Release);
    }
}

impl Default for CooldownGate {
    fn default() -> Self {
        Self::new(GRIEF_ALERT_COOLDOWN)
    }
}
