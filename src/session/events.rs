use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::debug;

use crate::error::ErrorKind;
use crate::transport::{ConnectTarget, Delivery};

/// Session lifecycle events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Transport is being opened
    Connecting { target: ConnectTarget },

    /// Transport is open
    Connected,

    /// Transport closed
    Closed,

    /// Reconnect scheduled
    Reconnecting { attempt: u32, delay: Duration },

    /// bind_transceiver sent
    Binding,

    /// Bound and ready to submit
    Bound {
        peer_system_id: Option<String>,
        peer_interface_version: Option<u8>,
    },

    /// Bind or submit failure, keepalive timeout
    Error {
        kind: ErrorKind,
        status: Option<u32>,
        detail: String,
    },

    /// deliver_sm / data_sm received and acknowledged
    Message(Delivery),

    /// Server throttle cool-down elapsed
    ThrottleCleared,

    /// stop() finished
    Stopped,
}

impl Event {
    /// Lifecycle name, used for logs and counters
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting { .. } => "connecting",
            Self::Connected => "connect",
            Self::Closed => "close",
            Self::Reconnecting { .. } => "reconnecting",
            Self::Binding => "binding",
            Self::Bound { .. } => "bound",
            Self::Error { .. } => "error",
            Self::Message(_) => "message",
            Self::ThrottleCleared => "throttle_cleared",
            Self::Stopped => "stopped",
        }
    }
}

/// Lifecycle event bus
///
/// Uses a broadcast channel so any number of observers can subscribe.
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Arc<Self> {
        let (tx, _) = broadcast::channel(capacity);
        Arc::new(Self { tx })
    }

    pub fn publish(&self, event: Event) {
        debug!(event = event.name(), "publishing event");
        // No subscribers is fine
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }
}
