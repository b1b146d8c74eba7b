//! Transport collaborator contract.
//!
//! PDU framing and the wire codec live behind these traits. A [`Connector`]
//! opens a [`Link`] and hands back the link's event stream; the session
//! drives requests through the link and reacts to its events.

mod mock;

pub use mock::{MockBehavior, MockSmsc, MockStats, MOCK_SYSTEM_ID};

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Transport failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    Closed,

    #[error("timeout waiting for response")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Peer address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectTarget {
    pub host: String,
    pub port: u16,
}

impl ConnectTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn url(&self) -> String {
        format!("smpp://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// bind_transceiver parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct BindParams {
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,
}

impl fmt::Debug for BindParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindParams")
            .field("system_id", &self.system_id)
            .field("password", &"***")
            .field("system_type", &self.system_type)
            .field("interface_version", &format_args!("0x{:02x}", self.interface_version))
            .field("addr_ton", &self.addr_ton)
            .field("addr_npi", &self.addr_npi)
            .field("address_range", &self.address_range)
            .finish()
    }
}

/// bind_transceiver_resp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindResponse {
    pub status: u32,
    /// Message center identifier
    pub system_id: Option<String>,
    /// sc_interface_version TLV
    pub sc_interface_version: Option<u8>,
}

/// short_message body before character encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Text; the transport applies the character set named by data_coding
    Text(String),
    /// Raw octets
    Binary(Vec<u8>),
}

impl Payload {
    /// Octet length as carried today (UTF-8 for text).
    pub fn len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            Self::Binary(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// short_message field: optional UDH prefix followed by the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortMessage {
    /// Encoded UDH including its length octet
    pub udh: Option<Vec<u8>>,
    pub payload: Payload,
}

impl ShortMessage {
    /// UDH followed by a binary payload; `None` for text, which the transport encodes.
    pub fn binary_octets(&self) -> Option<Vec<u8>> {
        match &self.payload {
            Payload::Binary(bytes) => {
                let mut out = self.udh.clone().unwrap_or_default();
                out.extend_from_slice(bytes);
                Some(out)
            }
            Payload::Text(_) => None,
        }
    }
}

/// submit_sm parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitParams {
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,
    pub short_message: ShortMessage,
}

/// submit_sm_resp.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitResponse {
    pub status: u32,
    pub message_id: Option<String>,
}

/// Peer-initiated message command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryCommand {
    DeliverSm,
    DataSm,
}

/// deliver_sm / data_sm received from the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub sequence: u32,
    pub command: DeliveryCommand,
    pub source_addr: String,
    pub destination_addr: String,
    pub esm_class: u8,
    pub data_coding: u8,
    /// receipted_message_id TLV (delivery receipts)
    pub receipted_message_id: Option<String>,
    pub short_message: Vec<u8>,
}

/// Response to a peer-initiated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ack {
    /// deliver_sm_resp / data_sm_resp with status 0
    Delivery {
        sequence: u32,
        command: DeliveryCommand,
        message_id: Option<String>,
    },
    /// enquire_link_resp
    EnquireLink { sequence: u32 },
}

/// Link event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// TCP session established
    Connected,
    /// Connection closed, by either side
    Closed,
    /// Transport error; a `Closed` normally follows
    Error(String),
    /// Incoming deliver_sm or data_sm
    Deliver(Delivery),
    /// Incoming enquire_link
    EnquireLink { sequence: u32 },
}

/// An open (or opening) connection to the peer.
///
/// Request methods resolve with the peer's response, or fail with
/// [`TransportError::Closed`] if the connection goes away first.
#[async_trait]
pub trait Link: Send + Sync {
    async fn bind(&self, params: BindParams) -> Result<BindResponse, TransportError>;

    async fn submit(&self, params: SubmitParams) -> Result<SubmitResponse, TransportError>;

    /// Send enquire_link, returning the response status.
    async fn enquire_link(&self) -> Result<u32, TransportError>;

    async fn unbind(&self) -> Result<(), TransportError>;

    async fn acknowledge(&self, ack: Ack) -> Result<(), TransportError>;

    /// Close the connection. Emits `Closed` if it was open.
    async fn close(&self);
}

/// Opens links.
pub trait Connector: Send + Sync + 'static {
    /// Start connecting; `Connected` (or `Error`/`Closed`) arrives on the event stream.
    fn connect(&self, target: &ConnectTarget) -> Connection;
}

/// Handle returned by [`Connector::connect`].
pub struct Connection {
    pub link: Arc<dyn Link>,
    pub events: mpsc::UnboundedReceiver<LinkEvent>,
}
