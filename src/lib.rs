//! esmed: an SMPP ESME session manager.
//!
//! Keeps one transceiver bind to a message center alive, rate-limits
//! submits, encodes messages into submit_sm parameters and maps peer
//! statuses onto [`AppError`].

pub mod classifier;
pub mod config;
pub mod encoder;
pub mod error;
pub mod session;
pub mod telemetry;
pub mod throttle;
pub mod transport;

pub use encoder::OutboundMessage;
pub use error::{AppError, ErrorKind};
pub use session::{Event, Session, SessionConfig, SessionState, SubmitResult};
