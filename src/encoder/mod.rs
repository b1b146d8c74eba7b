//! Converts outbound messages into submit_sm parameters.

mod message;
pub mod report;
pub mod udh;

pub use message::{Encoding, OutboundMessage, MAX_ADDRESS_LEN, MAX_USER_DATA_OCTETS};
pub use report::{Receipt, Report};
pub use udh::{Concatenation, PortAddressing, Udh};

use tracing::trace;

use crate::error::AppError;
use crate::transport::{Payload, ShortMessage, SubmitParams};

/// data_coding: SMSC default alphabet.
pub const DATA_CODING_DEFAULT: u8 = 0x00;
/// data_coding: 8-bit binary.
pub const DATA_CODING_BINARY: u8 = 0x04;
/// data_coding: UCS2 (ISO/IEC-10646).
pub const DATA_CODING_UCS2: u8 = 0x08;

/// esm_class UDH indicator.
pub const ESM_CLASS_UDHI: u8 = 0x40;

/// Session-wide submit_sm defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitDefaults {
    pub service_type: String,
    pub source_addr: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
}

/// Build submit_sm parameters for `message`, filling unset fields from `defaults`.
///
/// `pid`/`dcs` on the message take precedence over everything else, including
/// the data_coding implied by `encoding`.
pub fn encode(message: &OutboundMessage, defaults: &SubmitDefaults) -> Result<SubmitParams, AppError> {
    let encoding = message.encoding();

    let (data_coding, payload) = match encoding {
        Encoding::Default => (DATA_CODING_DEFAULT, Payload::Text(message.content.clone())),
        Encoding::Ucs2 => (DATA_CODING_UCS2, Payload::Text(message.content.clone())),
        Encoding::Binary => {
            let bytes = message.binary_payload()?.unwrap_or_default();
            (DATA_CODING_BINARY, Payload::Binary(bytes))
        }
    };

    let udh = message.udh.as_ref().map(Udh::encode);
    let esm_class = if udh.is_some() { ESM_CLASS_UDHI } else { 0 };

    let params = SubmitParams {
        service_type: defaults.service_type.clone(),
        source_addr_ton: defaults.source_addr_ton,
        source_addr_npi: defaults.source_addr_npi,
        source_addr: defaults.source_addr.clone(),
        dest_addr_ton: defaults.dest_addr_ton,
        dest_addr_npi: defaults.dest_addr_npi,
        destination_addr: message.destination.trim().to_string(),
        esm_class,
        protocol_id: message.pid.unwrap_or(0),
        priority_flag: 0,
        registered_delivery: report::registered_delivery(message.report.as_ref()),
        data_coding: message.dcs.unwrap_or(data_coding),
        short_message: ShortMessage { udh, payload },
    };

    trace!(
        destination = %params.destination_addr,
        encoding = %encoding,
        data_coding = params.data_coding,
        registered_delivery = params.registered_delivery,
        length = params.short_message.payload.len(),
        "message encoded"
    );

    Ok(params)
}
