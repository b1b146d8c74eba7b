//! Reconnect scheduling.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Delay used when a configured delay is zero.
pub const FALLBACK_DELAY: Duration = Duration::from_secs(60);

/// Consecutive-failure counter plus the single pending reconnect.
#[derive(Debug)]
pub struct ReconnectBackoff {
    /// Delay after the first failure
    initial: Duration,
    /// Delay after every later consecutive failure
    subsequent: Duration,
    failures: u32,
    pending: Option<Instant>,
}

impl ReconnectBackoff {
    pub fn new(initial: Duration, subsequent: Duration) -> Self {
        Self {
            initial,
            subsequent,
            failures: 0,
            pending: None,
        }
    }

    /// Record a failure and schedule a reconnect.
    ///
    /// Returns the chosen delay, or `None` when a reconnect is already pending.
    pub fn schedule(&mut self, now: Instant) -> Option<Duration> {
        if self.pending.is_some() {
            debug!(failures = self.failures, "reconnect already pending");
            return None;
        }

        self.failures = self.failures.saturating_add(1);
        let delay = match self.failures {
            1 => self.initial,
            _ => self.subsequent,
        };
        let delay = if delay.is_zero() { FALLBACK_DELAY } else { delay };

        self.pending = Some(now + delay);
        Some(delay)
    }

    /// Clear the pending reconnect if it is due. True means connect now.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.pending {
            Some(at) if now >= at => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.pending
    }

    /// Successful bind.
    pub fn reset(&mut self) {
        self.failures = 0;
        self.pending = None;
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_then_subsequent() {
        let mut b = ReconnectBackoff::new(Duration::from_secs(3), Duration::from_secs(5));
        let t0 = Instant::now();

        assert_eq!(b.schedule(t0), Some(Duration::from_secs(3)));
        assert!(b.fire(t0 + Duration::from_secs(3)));
        assert_eq!(b.schedule(t0), Some(Duration::from_secs(5)));
        assert!(b.fire(t0 + Duration::from_secs(5)));
        assert_eq!(b.schedule(t0), Some(Duration::from_secs(5)));
        assert_eq!(b.failures(), 3);
    }

    #[test]
    fn test_no_overlapping_schedule() {
        let mut b = ReconnectBackoff::new(Duration::from_secs(3), Duration::from_secs(5));
        let t0 = Instant::now();

        assert!(b.schedule(t0).is_some());
        assert_eq!(b.schedule(t0 + Duration::from_secs(1)), None);
        assert_eq!(b.failures(), 1);
        assert_eq!(b.deadline(), Some(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_fire_waits_for_deadline() {
        let mut b = ReconnectBackoff::new(Duration::from_secs(3), Duration::from_secs(5));
        let t0 = Instant::now();
        b.schedule(t0);

        assert!(!b.fire(t0 + Duration::from_millis(2999)));
        assert!(b.fire(t0 + Duration::from_secs(3)));
        assert!(!b.fire(t0 + Duration::from_secs(4)));
    }

    #[test]
    fn test_reset_after_bind() {
        let mut b = ReconnectBackoff::new(Duration::from_secs(3), Duration::from_secs(5));
        let t0 = Instant::now();
        b.schedule(t0);
        b.fire(t0 + Duration::from_secs(3));
        b.schedule(t0);
        b.reset();

        assert_eq!(b.failures(), 0);
        assert_eq!(b.deadline(), None);
        assert_eq!(b.schedule(t0), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_zero_falls_back() {
        let mut b = ReconnectBackoff::new(Duration::ZERO, Duration::ZERO);
        assert_eq!(b.schedule(Instant::now()), Some(FALLBACK_DELAY));
    }
}
