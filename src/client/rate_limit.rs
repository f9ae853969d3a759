//! Reactive client-side throttling
//!
//! The throttle stays dormant until the API answers with a 429. From then on
//! every attempt made through the same retry policy waits for a token, so a
//! rate-limited session slows down instead of hammering the API.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicBool, Ordering};

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use log::debug;

/// Requests per second once throttling is active
pub const THROTTLED_REQUESTS_PER_SECOND: u32 = 6;

/// Rate limiter that only applies after the first 429
pub struct Throttle {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    active: AtomicBool,
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(THROTTLED_REQUESTS_PER_SECOND)
    }
}

impl std::fmt::Debug for Throttle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Throttle")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Throttle {
    /// Create a dormant throttle allowing `per_second` requests once active.
    pub fn new(per_second: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: RateLimiter::direct(quota),
            active: AtomicBool::new(false),
        }
    }

    /// Activate throttling (called on 429).
    pub fn activate(&self) {
        let was_active = self.active.swap(true, Ordering::SeqCst);
        if !was_active {
            debug!("Rate limiting activated after HTTP 429");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait for permission if throttling is active.
    pub async fn wait_if_active(&self) {
        if self.is_active() {
            self.limiter.until_ready().await;
        }
    }
}
