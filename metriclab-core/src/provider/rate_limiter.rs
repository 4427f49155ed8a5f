//! Request spacing for provider clients.
//!
//! One limiter is created per run and shared (`Arc`) by every client and
//! worker of that run, so the minimum spacing between request starts holds
//! globally. Separate runs own separate limiters and never interfere.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Enforces a minimum interval between consecutive request starts.
#[derive(Debug)]
pub struct RateLimiter {
    min_spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            next_slot: Mutex::new(None),
        }
    }

    /// Default provider spacing: 100 ms between requests.
    pub fn default_provider() -> Self {
        Self::new(Duration::from_millis(100))
    }

    /// No spacing at all (fixtures and tests).
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_spacing(&self) -> Duration {
        self.min_spacing
    }

    /// Block until the caller may start a request. Returns the time waited.
    ///
    /// The slot is reserved under the lock and the sleep happens outside
    /// it, so concurrent callers queue up one spacing apart.
    pub fn acquire(&self) -> Duration {
        let wait = self.reserve(Instant::now());
        if !wait.is_zero() {
            log::debug!("rate limiter: waiting {} ms", wait.as_millis());
            std::thread::sleep(wait);
        }
        wait
    }

    /// Reserve the next slot as of `now`; returns how long to wait for it.
    fn reserve(&self, now: Instant) -> Duration {
        let mut next = self
            .next_slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.min_spacing);
        slot.saturating_duration_since(now)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::default_provider()
    }
}
