//! Maps submit response statuses onto the application error taxonomy.
//!
//! A throttling status additionally opens a cool-down window; while it is
//! open the session rejects submits without touching the transport.

pub mod status;

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{AppError, ErrorKind};

/// Default server throttle cool-down.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(60_000);

/// Classifies peer responses and owns the server throttle cool-down.
#[derive(Debug)]
pub struct ResponseClassifier {
    /// Length of the cool-down window
    cooldown: Duration,

    /// End of the current cool-down window
    throttled_until: Option<Instant>,
}

impl ResponseClassifier {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            throttled_until: None,
        }
    }

    /// Classify a submit response status observed now.
    pub fn classify(&mut self, status: u32) -> Option<AppError> {
        self.classify_at(status, Instant::now())
    }

    /// Classify a submit response status observed at `now`.
    pub fn classify_at(&mut self, status: u32, now: Instant) -> Option<AppError> {
        debug!(status = status, code = status::name(status), "classifying response");

        match status {
            status::ESME_ROK => None,
            status::ESME_RTHROTTLED => {
                let until = now + self.cooldown;
                self.throttled_until = Some(until);
                warn!(
                    cooldown_ms = self.cooldown.as_millis() as u64,
                    "server throttle triggered"
                );
                Some(AppError::with_status(
                    ErrorKind::ServerThrottle,
                    "server throttle triggered",
                    status,
                ))
            }
            status::ESME_RMSGQFUL => Some(AppError::with_status(
                ErrorKind::SubmitFailed,
                "message queue full",
                status,
            )),
            s if status::is_invalid_destination(s) => Some(AppError::with_status(
                ErrorKind::SubmitFailed,
                format!("invalid address ({})", status::name(s)),
                s,
            )),
            s => Some(AppError::with_status(
                ErrorKind::SubmitFailed,
                format!("submit error ({} 0x{:08X})", status::name(s), s),
                s,
            )),
        }
    }

    /// Whether the cool-down window is open at `now`.
    pub fn is_throttled(&self, now: Instant) -> bool {
        matches!(self.throttled_until, Some(until) if now < until)
    }

    /// End of the open cool-down window, if any.
    pub fn throttled_until(&self) -> Option<Instant> {
        self.throttled_until
    }

    /// Close the window once it has elapsed. Returns true if it was closed.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.throttled_until {
            Some(until) if now >= until => {
                self.throttled_until = None;
                info!("server throttle cleared");
                true
            }
            _ => false,
        }
    }

    /// Drop any cool-down (the session lost its connection).
    pub fn reset(&mut self) {
        self.throttled_until = None;
    }
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_is_not_an_error() {
        let mut classifier = ResponseClassifier::default();
        assert!(classifier.classify(status::ESME_ROK).is_none());
        assert!(!classifier.is_throttled(Instant::now()));
    }

    #[test]
    fn test_throttle_opens_cooldown() {
        let mut classifier = ResponseClassifier::default();
        let now = Instant::now();

        let err = classifier.classify_at(status::ESME_RTHROTTLED, now).unwrap();
        assert_eq!(err.kind, ErrorKind::ServerThrottle);
        assert_eq!(err.status, Some(status::ESME_RTHROTTLED));

        assert!(classifier.is_throttled(now));
        assert!(classifier.is_throttled(now + Duration::from_millis(59_999)));
        assert!(!classifier.is_throttled(now + DEFAULT_COOLDOWN));
    }

    #[test]
    fn test_expire_clears_only_after_window() {
        let mut classifier = ResponseClassifier::new(Duration::from_secs(10));
        let now = Instant::now();
        classifier.classify_at(status::ESME_RTHROTTLED, now);

        assert!(!classifier.expire(now + Duration::from_secs(5)));
        assert!(classifier.throttled_until().is_some());

        assert!(classifier.expire(now + Duration::from_secs(10)));
        assert!(classifier.throttled_until().is_none());
    }

    #[test]
    fn test_queue_full_has_no_cooldown() {
        let mut classifier = ResponseClassifier::default();
        let err = classifier.classify(status::ESME_RMSGQFUL).unwrap();
        assert_eq!(err.kind, ErrorKind::SubmitFailed);
        assert_eq!(err.detail, "message queue full");
        assert!(classifier.throttled_until().is_none());
    }

    #[test]
    fn test_invalid_destination_statuses() {
        let mut classifier = ResponseClassifier::default();
        for s in [
            status::ESME_RINVDSTADR,
            status::ESME_RINVDSTTON,
            status::ESME_RINVDSTNPI,
            status::ESME_RINVDSTADDRSUBUNIT,
        ] {
            let err = classifier.classify(s).unwrap();
            assert_eq!(err.kind, ErrorKind::SubmitFailed);
            assert!(err.detail.starts_with("invalid address"), "{}", err.detail);
            assert_eq!(err.status, Some(s));
        }
    }

    #[test]
    fn test_other_status_preserves_code() {
        let mut classifier = ResponseClassifier::default();
        let err = classifier.classify(0x0000_0400).unwrap();
        assert_eq!(err.kind, ErrorKind::SubmitFailed);
        assert_eq!(err.status, Some(0x400));
        assert!(err.detail.contains("0x00000400"));
    }
}
