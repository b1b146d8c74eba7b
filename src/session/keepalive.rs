//! enquire_link watchdog.
//!
//! One idle timer, re-armed on every activity. When it fires an enquire_link
//! goes out and a response deadline is armed in its place; missing that
//! deadline means the peer is gone.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// What the owner should do after [`Keepalive::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    None,
    /// Send an enquire_link tagged with this id
    SendPing(u64),
    /// The in-flight enquire_link was not answered in time
    TimedOut,
}

#[derive(Debug)]
pub struct Keepalive {
    /// Inactivity before a ping is sent
    interval: Duration,
    /// How long to wait for the ping response
    response_timeout: Duration,
    idle_deadline: Option<Instant>,
    response_deadline: Option<Instant>,
    /// Id of the ping in flight
    in_flight: Option<u64>,
    next_id: u64,
}

impl Keepalive {
    pub fn new(interval: Duration, response_timeout: Duration) -> Self {
        Self {
            interval,
            response_timeout,
            idle_deadline: None,
            response_deadline: None,
            in_flight: None,
            next_id: 1,
        }
    }

    /// Record activity: re-arm the idle timer.
    pub fn touch(&mut self, now: Instant) {
        self.idle_deadline = Some(now + self.interval);
        trace!(interval_ms = self.interval.as_millis() as u64, "keepalive re-armed");
    }

    pub fn is_pinging(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.idle_deadline, self.response_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Advance the timers to `now`.
    pub fn poll(&mut self, now: Instant) -> KeepaliveAction {
        if let Some(deadline) = self.response_deadline {
            if now >= deadline {
                warn!(
                    timeout_ms = self.response_timeout.as_millis() as u64,
                    "enquire_link response timed out"
                );
                self.cancel();
                return KeepaliveAction::TimedOut;
            }
        }

        match self.idle_deadline {
            Some(deadline) if now >= deadline => {
                self.idle_deadline = None;
                if self.in_flight.is_some() {
                    trace!("enquire_link already in flight");
                    return KeepaliveAction::None;
                }

                let id = self.next_id;
                self.next_id += 1;
                self.in_flight = Some(id);
                self.response_deadline = Some(now + self.response_timeout);
                debug!(ping = id, "sending enquire_link");
                KeepaliveAction::SendPing(id)
            }
            _ => KeepaliveAction::None,
        }
    }

    /// A ping response arrived. Returns false for an unknown or stale id.
    pub fn on_response(&mut self, id: u64, now: Instant) -> bool {
        if self.in_flight != Some(id) {
            trace!(ping = id, "ignoring stale enquire_link response");
            return false;
        }

        self.in_flight = None;
        self.response_deadline = None;
        self.touch(now);
        true
    }

    /// Drop every timer and forget the ping in flight.
    pub fn cancel(&mut self) {
        self.idle_deadline = None;
        self.response_deadline = None;
        self.in_flight = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchdog() -> Keepalive {
        Keepalive::new(Duration::from_secs(60), Duration::from_secs(3))
    }

    #[test]
    fn test_idle_until_touched() {
        let mut ka = watchdog();
        let now = Instant::now();
        assert_eq!(ka.next_deadline(), None);
        assert_eq!(ka.poll(now + Duration::from_secs(3600)), KeepaliveAction::None);
    }

    #[test]
    fn test_ping_after_interval() {
        let mut ka = watchdog();
        let t0 = Instant::now();
        ka.touch(t0);

        assert_eq!(ka.poll(t0 + Duration::from_secs(59)), KeepaliveAction::None);
        assert_eq!(ka.poll(t0 + Duration::from_secs(60)), KeepaliveAction::SendPing(1));
        assert!(ka.is_pinging());
        assert_eq!(ka.next_deadline(), Some(t0 + Duration::from_secs(63)));
    }

    #[test]
    fn test_response_rearms() {
        let mut ka = watchdog();
        let t0 = Instant::now();
        ka.touch(t0);

        let t1 = t0 + Duration::from_secs(60);
        assert_eq!(ka.poll(t1), KeepaliveAction::SendPing(1));
        assert!(ka.on_response(1, t1 + Duration::from_secs(1)));
        assert!(!ka.is_pinging());
        assert_eq!(ka.next_deadline(), Some(t1 + Duration::from_secs(61)));

        // late duplicate
        assert!(!ka.on_response(1, t1 + Duration::from_secs(2)));
    }

    #[test]
    fn test_times_out_once() {
        let mut ka = watchdog();
        let t0 = Instant::now();
        ka.touch(t0);
        ka.poll(t0 + Duration::from_secs(60));

        let late = t0 + Duration::from_secs(63);
        assert_eq!(ka.poll(late), KeepaliveAction::TimedOut);
        assert_eq!(ka.poll(late), KeepaliveAction::None);
        assert_eq!(ka.poll(late + Duration::from_secs(600)), KeepaliveAction::None);
        assert!(!ka.is_pinging());
    }

    #[test]
    fn test_activity_during_ping_does_not_send_second() {
        let mut ka = watchdog();
        let t0 = Instant::now();
        ka.touch(t0);
        assert_eq!(ka.poll(t0 + Duration::from_secs(60)), KeepaliveAction::SendPing(1));

        // A submit response re-arms idle while the ping is still out
        ka.touch(t0 + Duration::from_secs(60));
        ka.response_timeout = Duration::from_secs(120);
        ka.response_deadline = Some(t0 + Duration::from_secs(300));

        assert_eq!(ka.poll(t0 + Duration::from_secs(120)), KeepaliveAction::None);
        assert!(ka.is_pinging());
    }

    #[test]
    fn test_cancel() {
        let mut ka = watchdog();
        let t0 = Instant::now();
        ka.touch(t0);
        ka.poll(t0 + Duration::from_secs(60));
        ka.cancel();

        assert_eq!(ka.next_deadline(), None);
        assert!(!ka.is_pinging());
    }
}
