//! ESME session: one long-lived transceiver bind to a message center.
//!
//! [`Session`] is a cheap handle onto a task that owns all session state.
//! Connection loss, bind failure and keepalive timeouts are handled inside
//! that task; callers only submit messages and watch events.

mod actor;
mod backoff;
mod config;
mod events;
mod keepalive;
mod state;

pub use backoff::{ReconnectBackoff, FALLBACK_DELAY};
pub use config::{SessionConfig, Timeouts, INTERFACE_VERSION_34};
pub use events::{Event, EventBus};
pub use keepalive::{Keepalive, KeepaliveAction};
pub use state::{InvalidTransition, SessionSnapshot, SessionState, StateMachine};

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info_span, Instrument};

use crate::encoder::OutboundMessage;
use crate::error::AppError;
use crate::throttle::ThrottleGate;
use crate::transport::Connector;
use actor::{Command, SessionActor};

const COMMAND_BUFFER: usize = 1024;
const EVENT_BUFFER: usize = 256;

/// Extra time granted to the actor beyond the caller's stop deadline.
const STOP_GRACE: Duration = Duration::from_millis(250);

/// Successful submit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResult {
    /// Identifier assigned by the peer
    pub message_id: String,
}

/// Handle to a running session.
#[derive(Clone)]
pub struct Session {
    commands: mpsc::Sender<Command>,
    events: Arc<EventBus>,
    snapshot: watch::Receiver<SessionSnapshot>,
    throttle: Option<Arc<ThrottleGate>>,
    config: Arc<SessionConfig>,
}

impl Session {
    /// Start the session task. Nothing is opened until [`connect`](Self::connect).
    pub fn spawn(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        let config = Arc::new(config);
        let throttle = config.throttle.map(|t| Arc::new(ThrottleGate::new(t)));
        let events = EventBus::new(EVENT_BUFFER);
        let (snapshot_tx, snapshot) = watch::channel(SessionSnapshot::default());
        let (commands, commands_rx) = mpsc::channel(COMMAND_BUFFER);

        let actor = SessionActor::new(
            config.clone(),
            connector,
            throttle.clone(),
            events.clone(),
            snapshot_tx,
            commands_rx,
        );
        let span = info_span!("session", peer = %config.target, system_id = %config.bind.system_id);
        tokio::spawn(actor.run().instrument(span));

        Self {
            commands,
            events,
            snapshot,
            throttle,
            config,
        }
    }

    /// Open the transport and bind. No-op unless the session is idle.
    pub async fn connect(&self) {
        self.send(Command::Connect).await;
    }

    /// Bind on an open transport. The session does this by itself after every
    /// connect, so this only matters if that bind was never started.
    pub async fn bind(&self) {
        self.send(Command::Bind).await;
    }

    /// Submit a message and wait for the peer's answer.
    pub async fn submit(&self, message: OutboundMessage) -> Result<SubmitResult, AppError> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Submit { message, reply }).await.is_err() {
            return Err(stopped());
        }
        rx.await.unwrap_or_else(|_| Err(stopped()))
    }

    /// Unbind (bounded by `deadline`), close and cancel every timer. Safe in any state.
    pub async fn stop(&self, deadline: Duration) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Stop { deadline, reply }).await.is_err() {
            debug!("session already stopped");
            return;
        }
        if tokio::time::timeout(deadline + STOP_GRACE, rx).await.is_err() {
            debug!("stop did not confirm in time");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    /// Wait until the session reaches `state`. False if the session task ended first.
    pub async fn wait_for_state(&self, state: SessionState) -> bool {
        let mut rx = self.snapshot.clone();
        let reached = rx.wait_for(|s| s.state == state).await.is_ok();
        reached
    }

    /// Client-side throttle, if one is configured.
    pub fn throttle(&self) -> Option<&ThrottleGate> {
        self.throttle.as_deref()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    async fn send(&self, cmd: Command) {
        if self.commands.send(cmd).await.is_err() {
            debug!("session task is gone");
        }
    }
}

fn stopped() -> AppError {
    AppError::new(crate::error::ErrorKind::Unbound, "session stopped")
}
