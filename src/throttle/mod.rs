//! Client-side submit throttle.
//!
//! A token bucket holding `capacity` tokens that refills continuously at
//! `capacity / period`. Reservation is a single critical section, so
//! concurrent callers can never drive the bucket below zero.

use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace};

/// Throttle parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Bucket capacity (messages per period)
    pub capacity: u32,

    /// Time to refill an empty bucket
    pub period: Duration,
}

impl ThrottleConfig {
    pub fn new(capacity: u32, period: Duration) -> Self {
        Self { capacity, period }
    }
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket rate limiter.
struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    /// Tokens added per second
    rate: f64,
}

impl TokenBucket {
    fn new(config: ThrottleConfig) -> Self {
        let capacity = f64::from(config.capacity);
        let period = config.period.as_secs_f64();
        let rate = if period > 0.0 { capacity / period } else { capacity };

        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            rate,
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill);
        if elapsed.is_zero() {
            return;
        }
        state.tokens = (state.tokens + elapsed.as_secs_f64() * self.rate).min(self.capacity);
        state.last_refill = now;
    }

    fn try_acquire(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state, now);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            trace!(remaining = state.tokens, "token reserved");
            true
        } else {
            false
        }
    }

    fn available(&self, now: Instant) -> u32 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.refill(&mut state, now);
        state.tokens.floor() as u32
    }
}

/// Guards outbound submission volume.
pub struct ThrottleGate {
    bucket: TokenBucket,
    config: ThrottleConfig,
}

impl ThrottleGate {
    /// Create a gate with a full bucket.
    pub fn new(config: ThrottleConfig) -> Self {
        debug!(
            capacity = config.capacity,
            period_ms = config.period.as_millis() as u64,
            "throttle gate created"
        );
        Self {
            bucket: TokenBucket::new(config),
            config,
        }
    }

    /// Take one token. Returns false, leaving the bucket untouched, when none is available.
    pub fn reserve(&self) -> bool {
        self.bucket.try_acquire(Instant::now())
    }

    /// Whole tokens currently available.
    pub fn available(&self) -> u32 {
        self.bucket.available(Instant::now())
    }

    pub fn config(&self) -> ThrottleConfig {
        self.config
    }
}

impl std::fmt::Debug for ThrottleGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThrottleGate")
            .field("config", &self.config)
            .field("available", &self.available())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_bucket_exhausts_at_capacity() {
        let gate = ThrottleGate::new(ThrottleConfig::new(3, Duration::from_secs(60)));

        assert!(gate.reserve());
        assert!(gate.reserve());
        assert!(gate.reserve());
        assert!(!gate.reserve());
        assert_eq!(gate.available(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bucket_refills_over_period() {
        let gate = ThrottleGate::new(ThrottleConfig::new(2, Duration::from_secs(60)));
        assert!(gate.reserve());
        assert!(gate.reserve());
        assert!(!gate.reserve());

        // Half the period restores one token
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(gate.available(), 1);
        assert!(gate.reserve());
        assert!(!gate.reserve());

        // Never exceeds capacity
        tokio::time::advance(Duration::from_secs(600)).await;
        assert_eq!(gate.available(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reserve_does_not_mutate() {
        let gate = ThrottleGate::new(ThrottleConfig::new(1, Duration::from_secs(10)));
        assert!(gate.reserve());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!gate.reserve());
        assert!(!gate.reserve());

        // The half token accumulated so far is still there
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(gate.reserve());
    }

    #[test]
    fn test_concurrent_reserve_never_over_admits() {
        let gate = Arc::new(ThrottleGate::new(ThrottleConfig::new(
            100,
            Duration::from_secs(3600),
        )));
        let admitted = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                let admitted = admitted.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        if gate.reserve() {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        // A few tokens may trickle back in during the run
        let admitted = admitted.load(Ordering::SeqCst);
        assert!((100..=101).contains(&admitted), "admitted {}", admitted);
    }
}
