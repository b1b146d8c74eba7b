//! Outbound message model and validation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::report::Report;
use super::udh::Udh;
use crate::error::AppError;

/// Longest destination address accepted (SMPP destination_addr is 21 octets with NUL).
pub const MAX_ADDRESS_LEN: usize = 20;

/// Maximum TP-User-Data length in octets.
pub const MAX_USER_DATA_OCTETS: usize = 140;

/// Content encoding selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Encoding {
    /// SMSC default alphabet
    #[default]
    Default,
    /// UCS2, content still supplied as text
    Ucs2,
    /// Hex-encoded octets
    Binary,
}

impl FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "ucs2" => Ok(Self::Ucs2),
            "binary" => Ok(Self::Binary),
            other => Err(format!("unknown encoding: {}", other)),
        }
    }
}

impl TryFrom<String> for Encoding {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Encoding> for String {
    fn from(e: Encoding) -> Self {
        e.to_string()
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Default => "default",
            Self::Ucs2 => "UCS2",
            Self::Binary => "binary",
        })
    }
}

/// A message to submit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination address
    pub destination: String,

    /// Text, or hex octets when `encoding` is binary
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<Encoding>,

    /// Delivery report request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report: Option<Report>,

    /// User data header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udh: Option<Udh>,

    /// protocol_id override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<u8>,

    /// data_coding override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dcs: Option<u8>,
}

impl OutboundMessage {
    /// Plain text message.
    pub fn text(destination: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    pub fn with_report(mut self, report: Report) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_udh(mut self, udh: Udh) -> Self {
        self.udh = Some(udh);
        self
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding.unwrap_or_default()
    }

    /// Decode binary content. Text content yields `None`.
    pub(crate) fn binary_payload(&self) -> Result<Option<Vec<u8>>, AppError> {
        if self.encoding() != Encoding::Binary {
            return Ok(None);
        }
        hex::decode(&self.content)
            .map(Some)
            .map_err(|e| AppError::validation(format!("binary content is not valid hex: {}", e)))
    }

    /// Reject malformed messages before anything touches the transport.
    pub fn validate(&self) -> Result<(), AppError> {
        let destination = self.destination.trim();
        if destination.is_empty() {
            return Err(AppError::validation("destination absent"));
        }
        if destination.chars().count() > MAX_ADDRESS_LEN {
            return Err(AppError::validation(format!(
                "destination longer than {} characters",
                MAX_ADDRESS_LEN
            )));
        }

        if self.content.is_empty() {
            return Err(AppError::validation("content absent"));
        }

        let udh_len = match &self.udh {
            Some(udh) => {
                udh.validate()?;
                udh.encode().len()
            }
            None => 0,
        };

        if let Some(payload) = self.binary_payload()? {
            if udh_len + payload.len() > MAX_USER_DATA_OCTETS {
                return Err(AppError::validation(format!(
                    "binary user data is {} octets, limit is {}",
                    udh_len + payload.len(),
                    MAX_USER_DATA_OCTETS
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_valid_text() {
        assert!(OutboundMessage::text("+258841234567", "hello").validate().is_ok());
    }

    #[test]
    fn test_missing_fields() {
        let err = OutboundMessage::text("", "hello").validate().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.detail, "destination absent");

        let err = OutboundMessage::text("123", "").validate().unwrap_err();
        assert_eq!(err.detail, "content absent");
    }

    #[test]
    fn test_destination_too_long() {
        let msg = OutboundMessage::text("1".repeat(21), "hi");
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_binary_must_be_hex() {
        let msg = OutboundMessage::text("123", "zz").with_encoding(Encoding::Binary);
        assert_eq!(msg.validate().unwrap_err().kind, ErrorKind::Validation);

        let msg = OutboundMessage::text("123", "abc").with_encoding(Encoding::Binary);
        assert!(msg.validate().is_err());

        let msg = OutboundMessage::text("123", "68656c6c6f").with_encoding(Encoding::Binary);
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_binary_user_data_limit() {
        let msg = OutboundMessage::text("123", "00".repeat(133))
            .with_encoding(Encoding::Binary)
            .with_udh(Udh::port(0, 2948));
        assert!(msg.validate().is_ok());

        let msg = OutboundMessage::text("123", "00".repeat(134))
            .with_encoding(Encoding::Binary)
            .with_udh(Udh::port(0, 2948));
        assert!(msg.validate().is_err());
    }

    #[test]
    fn test_bad_udh_rejected() {
        let msg = OutboundMessage::text("123", "hi").with_udh(Udh::concat(1, 2, 5));
        assert_eq!(msg.validate().unwrap_err().kind, ErrorKind::Validation);
    }

    #[test]
    fn test_encoding_parse_is_case_insensitive() {
        assert_eq!("UCS2".parse::<Encoding>().unwrap(), Encoding::Ucs2);
        assert_eq!("ucs2".parse::<Encoding>().unwrap(), Encoding::Ucs2);
        assert_eq!("Binary".parse::<Encoding>().unwrap(), Encoding::Binary);
        assert!("latin1".parse::<Encoding>().is_err());
    }
}
