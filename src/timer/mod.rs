//! Debounced, cancellable single-shot timers
//!
//! A `DebouncedTimer` holds at most one pending firing. Restarting it moves
//! the deadline instead of stacking a second firing, and stopping it is
//! idempotent. Every arming gets a fresh generation; the spawned sleeper only
//! invokes the callback if its generation is still the live one, so a sleeper
//! that wakes after `stop`/`start_or_reset` is dropped silently.
//!
//! Timers spawn onto the ambient tokio runtime and must be armed from inside
//! one.

pub mod nag;

pub use nag::{CooldownGate, Nag, GRIEF_ALERT_COOLDOWN};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Identifies one arming of a timer
///
/// Owners that receive timer events through a queue compare the ticket with
/// `DebouncedTimer::is_current` before acting on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerTicket(u64);

impl TimerTicket {
    pub fn generation(self) -> u64 {
        self.0
    }
}

type Callback = Arc<dyn Fn(TimerTicket) + Send + Sync>;

// shared by all timers so tickets from a dropped timer never match a new one
static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

fn next_generation() -> u64 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    deadline: Option<Instant>,
}

/// Restartable single-shot delayed callback
pub struct DebouncedTimer {
    slot: Arc<Mutex<Slot>>,
    callback: Callback,
    sleeper: Option<JoinHandle<()>>,
}

impl DebouncedTimer {
    /// Timer with a zero-argument callback
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::with_ticket(move |_| callback())
    }

    /// Timer whose callback learns which arming fired
    pub fn with_ticket<F>(callback: F) -> Self
    where
        F: Fn(TimerTicket) + Send + Sync + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            callback: Arc::new(callback),
            sleeper: None,
        }
    }

    /// Schedule the callback `delay` from now, replacing any pending deadline
    pub fn start_or_reset(&mut self, delay: Duration) -> TimerTicket {
        let deadline = Instant::now() + delay;
        let ticket = {
            let mut slot = self.slot.lock();
            slot.generation = next_generation();
            slot.deadline = Some(deadline);
            TimerTicket(slot.generation)
        };

        if let Some(previous) = self.sleeper.take() {
            previous.abort();
        }

        let slot = Arc::clone(&self.slot);
        let callback = Arc::clone(&self.callback);
        self.sleeper = Some(tokio::spawn(async move {
            sleep_until(deadline).await;

            let due = {
                let mut slot = slot.lock();
                if slot.generation == ticket.0 && slot.deadline.is_some() {
                    slot.deadline = None;
                    true
                } else {
                    false
                }
            };

            if due {
                callback(ticket);
            } else {
                trace!(generation = ticket.0, "Dropping superseded timer wake-up");
            }
        }));

        ticket
    }

    /// Cancel the pending firing, if any
    ///
    /// Also invalidates the ticket of a firing that already happened, so a
    /// queued event from it no longer passes `is_current`.
    pub fn stop(&mut self) {
        {
            let mut slot = self.slot.lock();
            slot.deadline = None;
            slot.generation = next_generation();
        }
        if let Some(sleeper) = self.sleeper.take() {
            sleeper.abort();
        }
    }

    /// True iff a firing is pending
    pub fn is_active(&self) -> bool {
        self.slot.lock().deadline.is_some()
    }

    /// True iff `ticket` belongs to the latest arming and was not cancelled
    pub fn is_current(&self, ticket: TimerTicket) -> bool {
        self.slot.lock().generation == ticket.0
    }

    /// Time left until the pending firing
    pub fn remaining(&self) -> Option<Duration> {
        self.slot
            .lock()
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for DebouncedTimer {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for DebouncedTimer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("DebouncedTimer")
            .field("generation", &slot.generation)
            .field("deadline", &slot.deadline)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::sleep;

    fn counting_timer() -> (DebouncedTimer, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let timer = DebouncedTimer::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (timer, hits)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_delay() {
        let (mut timer, hits) = counting_timer();
        timer.start_or_reset(Duration::from_secs(1));
        assert!(timer.is_active());

        sleep(Duration::from_millis(999)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        sleep(Duration::from_millis(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!timer.is_active());

        sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_postpones_to_later_deadline() {
        let (mut timer, hits) = counting_timer();
        timer.start_or_reset(Duration::from_secs(1));
        sleep(Duration::from_millis(600)).await;
        timer.start_or_reset(Duration::from_secs(1));

        // the first deadline (t=1.0) passes without a firing
        sleep(Duration::from_millis(500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        // the second deadline is t=1.6
        sleep(Duration::from_millis(510)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_deadline_prevents_firing() {
        let (mut timer, hits) = counting_timer();
        timer.start_or_reset(Duration::from_secs(1));
        sleep(Duration::from_millis(300)).await;
        timer.stop();
        assert!(!timer.is_active());

        sleep(Duration::from_secs(2)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent_and_safe_after_firing() {
        let (mut timer, hits) = counting_timer();
        timer.stop();
        timer.start_or_reset(Duration::from_millis(100));
        sleep(Duration::from_millis(200)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        timer.stop();
        timer.stop();
        assert!(!timer.is_active());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tickets_go_stale_on_stop_and_restart() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&fired);
        let mut timer = DebouncedTimer::with_ticket(move |ticket| sink.lock().push(ticket));

        let first = timer.start_or_reset(Duration::from_millis(100));
        sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.lock().as_slice(), &[first]);
        assert!(timer.is_current(first));

        // an event from `first` still sitting in someone's queue is now stale
        timer.stop();
        assert!(!timer.is_current(first));

        let second = timer.start_or_reset(Duration::from_millis(100));
        assert_ne!(first, second);
        assert!(timer.is_current(second));
    }

    #[tokio::test(start_paused = true)]
    async fn tickets_are_unique_across_timers() {
        let (mut a, _) = counting_timer();
        let (mut b, _) = counting_timer();
        let first = a.start_or_reset(Duration::from_secs(1));
        let second = b.start_or_reset(Duration::from_secs(1));
        assert_ne!(first, second);
        assert!(!b.is_current(first));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_owner_cancels_pending_firing() {
        let (mut timer, hits) = counting_timer();
        timer.start_or_reset(Duration::from_millis(100));
        drop(timer);
        sleep(Duration::from_secs(1)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn remaining_tracks_deadline() {
        let (mut timer, _hits) = counting_timer();
        assert_eq!(timer.remaining(), None);
        timer.start_or_reset(Duration::from_secs(2));
        sleep(Duration::from_millis(500)).await;
        assert_eq!(timer.remaining(), Some(Duration::from_millis(1500)));
    }
}
