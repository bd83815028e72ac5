//! Multi-window request rate limiting.
//!
//! The [`RateLimiter`] tracks request counts against rolling time windows
//! (per-second, per-minute, per-hour) plus an optional lifetime cap. It is
//! pure bookkeeping: no I/O, no blocking, no interior locking. The scheduler
//! dispatch loop is the sole caller, so single-loop access is race-free; a
//! multi-threaded caller must serialize access externally to preserve the
//! check-then-increment atomicity.
//!
//! A reservation succeeds only if *every* active window is below its
//! ceiling, and then increments every window. A rejection changes nothing.

use crate::config::RateLimitConfig;
use std::time::{Duration, Instant};

/// One rolling window: a count that resets when `reset_at` is crossed.
#[derive(Debug)]
struct Window {
    length: Duration,
    ceiling: u32,
    count: u32,
    reset_at: Instant,
}

impl Window {
    fn new(length: Duration, ceiling: u32, now: Instant) -> Self {
        Self {
            length,
            ceiling,
            count: 0,
            reset_at: now + length,
        }
    }

    /// Resets the count if `reset_at` has passed, advancing `reset_at` by
    /// whole window lengths so it always lands in the future.
    fn rotate(&mut self, now: Instant) {
        if now < self.reset_at {
            return;
        }
        let behind = now.duration_since(self.reset_at);
        let periods = (behind.as_nanos() / self.length.as_nanos()) as u32 + 1;
        self.reset_at += self.length * periods;
        self.count = 0;
    }

    fn has_room(&self) -> bool {
        self.count < self.ceiling
    }
}

/// Rolling-window rate limiter with an optional lifetime cap.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Vec<Window>,
    lifetime_cap: Option<u64>,
    /// Total reservations granted since construction.
    granted: u64,
    /// Total reservations rejected since construction.
    rejected: u64,
}

impl RateLimiter {
    /// Creates a limiter from the configured ceilings.
    ///
    /// `now` anchors the first rotation of every window; the scheduler
    /// passes `tokio::time::Instant::now().into_std()` so simulated time
    /// works in tests.
    pub fn new(config: RateLimitConfig, now: Instant) -> Self {
        let mut windows = Vec::new();
        if let Some(ceiling) = config.per_second() {
            windows.push(Window::new(Duration::from_secs(1), ceiling, now));
        }
        if let Some(ceiling) = config.per_minute() {
            windows.push(Window::new(Duration::from_secs(60), ceiling, now));
        }
        if let Some(ceiling) = config.per_hour() {
            windows.push(Window::new(Duration::from_secs(3600), ceiling, now));
        }
        Self {
            windows,
            lifetime_cap: config.lifetime(),
            granted: 0,
            rejected: 0,
        }
    }

    /// Attempts to reserve one dispatch slot at `now`.
    ///
    /// Rotates stale windows first, then checks every window against its
    /// ceiling. Only when all pass is every count incremented; a rejection
    /// leaves no partial increments behind.
    pub fn try_reserve(&mut self, now: Instant) -> bool {
        for window in &mut self.windows {
            window.rotate(now);
        }

        let lifetime_ok = self.lifetime_cap.is_none_or(|cap| self.granted < cap);
        if !lifetime_ok || !self.windows.iter().all(Window::has_room) {
            self.rejected += 1;
            return false;
        }

        for window in &mut self.windows {
            window.count += 1;
        }
        self.granted += 1;
        true
    }

    /// Earliest instant at which a currently-blocked reservation could
    /// succeed, for the scheduler's wake timer.
    ///
    /// Meaningful immediately after [`try_reserve`](Self::try_reserve)
    /// returned `false` (windows are already rotated to `now`). Returns
    /// `None` when only the exhausted lifetime cap blocks: that block never
    /// lifts.
    pub fn retry_at(&self) -> Option<Instant> {
        if self
            .lifetime_cap
            .is_some_and(|cap| self.granted >= cap)
        {
            return None;
        }
        self.windows
            .iter()
            .filter(|w| !w.has_room())
            .map(|w| w.reset_at)
            .min()
    }

    /// Total reservations granted since construction.
    pub fn granted(&self) -> u64 {
        self.granted
    }

    /// Total reservations rejected since construction.
    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;

    fn second_only(ceiling: u32) -> RateLimitConfig {
        RateLimitConfig::unlimited().with_per_second(Some(ceiling))
    }

    #[test]
    fn test_reservations_up_to_ceiling() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new(second_only(3), now);

        assert!(limiter.try_reserve(now));
        assert!(limiter.try_reserve(now));
        assert!(limiter.try_reserve(now));
        assert!(!limiter.try_reserve(now));
        assert_eq!(limiter.granted(), 3);
        assert_eq!(limiter.rejected(), 1);
    }

    #[test]
    fn test_window_reset_allows_again() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new(second_only(1), now);

        assert!(limiter.try_reserve(now));
        assert!(!limiter.try_reserve(now));

        // Crossing reset_at resets the count.
        let later = now + Duration::from_millis(1001);
        assert!(limiter.try_reserve(later));
    }

    #[test]
    fn test_reset_idempotence_after_long_gap() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new(second_only(2), now);
        assert!(limiter.try_reserve(now));
        assert!(limiter.try_reserve(now));

        // Several whole windows elapse at once; rotation must land reset_at
        // in the future, not require repeated calls.
        let later = now + Duration::from_secs(10);
        assert!(limiter.try_reserve(later));
        assert!(limiter.try_reserve(later));
        assert!(!limiter.try_reserve(later));
    }

    #[test]
    fn test_no_partial_increments_on_rejection() {
        let now = Instant::now();
        // Second window permits 1, minute window permits 10.
        let config = RateLimitConfig::unlimited()
            .with_per_second(Some(1))
            .with_per_minute(Some(10));
        let mut limiter = RateLimiter::new(config, now);

        assert!(limiter.try_reserve(now));
        // Second window is full; the minute window must not have been
        // incremented by the rejected attempts.
        assert!(!limiter.try_reserve(now));
        assert!(!limiter.try_reserve(now));

        // Over the next 9 seconds we should get exactly 9 more through the
        // minute window (10 total), proving no phantom minute counts.
        for i in 1..=9u64 {
            let at = now + Duration::from_millis(1001 * i);
            assert!(limiter.try_reserve(at), "second {} should pass", i);
        }
        let at = now + Duration::from_millis(1001 * 10);
        assert!(!limiter.try_reserve(at), "minute ceiling should now gate");
    }

    #[test]
    fn test_lifetime_cap_is_permanent() {
        let now = Instant::now();
        let config = RateLimitConfig::unlimited().with_lifetime(Some(2));
        let mut limiter = RateLimiter::new(config, now);

        assert!(limiter.try_reserve(now));
        assert!(limiter.try_reserve(now));
        assert!(!limiter.try_reserve(now));

        // Time passing never lifts the lifetime cap.
        let later = now + Duration::from_secs(3600);
        assert!(!limiter.try_reserve(later));
        assert_eq!(limiter.retry_at(), None);
    }

    #[test]
    fn test_retry_at_reports_earliest_reset() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new(second_only(1), now);
        assert!(limiter.try_reserve(now));
        assert!(!limiter.try_reserve(now));

        let wake = limiter.retry_at().expect("second window should reset");
        assert_eq!(wake, now + Duration::from_secs(1));
    }

    #[test]
    fn test_unlimited_never_rejects() {
        let now = Instant::now();
        let mut limiter = RateLimiter::new(RateLimitConfig::unlimited(), now);
        for _ in 0..1000 {
            assert!(limiter.try_reserve(now));
        }
        assert_eq!(limiter.granted(), 1000);
    }
}
