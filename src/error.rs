//! Application error taxonomy returned across the submit boundary.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::classifier::status;

/// Machine-readable error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Submit attempted while the session is not bound
    Unbound,
    /// Peer signalled throttling, or the cool-down window is active
    ServerThrottle,
    /// Local token bucket is empty
    ClientThrottle,
    /// Malformed message
    Validation,
    /// Bind response carried a non-zero status
    BindFailed,
    /// Submit response carried a non-zero, non-throttle status
    SubmitFailed,
    /// Transport failed or closed while a call was pending
    Unknown,
}

impl ErrorKind {
    /// Stable error code for adapters.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unbound => "ERR_ESME_UNBOUND",
            Self::ServerThrottle => "ERR_ESME_THROTTLE_SERVER",
            Self::ClientThrottle => "ERR_ESME_THROTTLE_CLIENT",
            Self::Validation => "ERR_ESME_VALIDATION",
            Self::BindFailed => "ERR_ESME_BIND_FAILED",
            Self::SubmitFailed => "ERR_ESME_SUBMIT_FAILED",
            Self::Unknown => "ERR_ESME_UNKNOWN",
        }
    }

    /// Short label used for logs and metric attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unbound => "unbound",
            Self::ServerThrottle => "server_throttle",
            Self::ClientThrottle => "client_throttle",
            Self::Validation => "validation",
            Self::BindFailed => "bind_failed",
            Self::SubmitFailed => "submit_failed",
            Self::Unknown => "unknown",
        }
    }

    /// True when the caller sent a bad request rather than hitting a session condition.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by [`Session::submit`](crate::session::Session::submit).
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("{kind}: {detail}")]
pub struct AppError {
    pub kind: ErrorKind,
    pub detail: String,
    /// Raw peer command status, when the error came from a peer response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u32>,
}

impl AppError {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            status: None,
        }
    }

    /// Error carrying the peer's command status.
    pub fn with_status(kind: ErrorKind, detail: impl Into<String>, status: u32) -> Self {
        Self {
            kind,
            detail: detail.into(),
            status: Some(status),
        }
    }

    pub fn unbound() -> Self {
        Self::new(ErrorKind::Unbound, "can't submit in unbound state")
    }

    pub fn server_throttle() -> Self {
        Self::new(ErrorKind::ServerThrottle, "server throttle")
    }

    pub fn client_throttle() -> Self {
        Self::new(ErrorKind::ClientThrottle, "client throttle")
    }

    pub fn validation(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, detail)
    }

    pub fn bind_failed(status: u32) -> Self {
        Self::with_status(
            ErrorKind::BindFailed,
            format!("bind failed ({})", status::name(status)),
            status,
        )
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, detail)
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}
