//! Rate limiting for anti-cheat log output

use std::num::NonZeroU32;

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

/// Default ignored-request warnings per session per second
pub const IGNORED_LOG_RATE_LIMIT: u32 = 5;

/// Per-session budget for ignored-request warnings
///
/// Owned by one session task, so the limiter is held directly. A budget of
/// zero is treated as one warning per second.
pub struct IgnoredLogLimiter {
    per_second: NonZeroU32,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl IgnoredLogLimiter {
    pub fn new(per_second: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        Self {
            per_second,
            limiter: RateLimiter::direct(Quota::per_second(per_second)),
        }
    }

    /// Spend one warning; false once this second's budget is gone
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub fn per_second(&self) -> u32 {
        self.per_second.get()
    }
}

impl Default for IgnoredLogLimiter {
    fn default() -> Self {
        Self::new(IGNORED_LOG_RATE_LIMIT)
    }
}
