//! User Data Header information elements (3GPP TS 23.040 9.2.3.24).

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Concatenated short message, 8-bit reference.
pub const IEI_CONCAT_8BIT: u8 = 0x00;
/// Application port addressing, 16-bit ports.
pub const IEI_PORT_16BIT: u8 = 0x05;
/// Concatenated short message, 16-bit reference.
pub const IEI_CONCAT_16BIT: u8 = 0x08;

/// Application port addressing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAddressing {
    /// Originator port
    #[serde(default)]
    pub src: u16,

    /// Destination port
    pub dst: u16,
}

/// Multipart concatenation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concatenation {
    /// Reference shared by all parts
    #[serde(rename = "ref")]
    pub reference: u16,

    /// Number of parts
    pub total: u8,

    /// 1-based part index
    #[serde(alias = "seq")]
    pub index: u8,
}

/// User data header descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Udh {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<PortAddressing>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concat: Option<Concatenation>,
}

impl Udh {
    pub fn port(src: u16, dst: u16) -> Self {
        Self {
            port: Some(PortAddressing { src, dst }),
            concat: None,
        }
    }

    pub fn concat(reference: u16, total: u8, index: u8) -> Self {
        Self {
            port: None,
            concat: Some(Concatenation {
                reference,
                total,
                index,
            }),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.port.is_none() && self.concat.is_none() {
            return Err(AppError::validation("udh must describe port or concat"));
        }

        if let Some(c) = &self.concat {
            if c.total == 0 {
                return Err(AppError::validation("udh concat total must be at least 1"));
            }
            if c.index == 0 || c.index > c.total {
                return Err(AppError::validation(format!(
                    "udh concat index {} out of range 1..={}",
                    c.index, c.total
                )));
            }
        }

        Ok(())
    }

    /// Encode the header, length octet (UDHL) first.
    pub fn encode(&self) -> Vec<u8> {
        let mut elements = Vec::with_capacity(12);

        if let Some(c) = &self.concat {
            match u8::try_from(c.reference) {
                Ok(reference) => {
                    elements.extend_from_slice(&[IEI_CONCAT_8BIT, 0x03, reference, c.total, c.index]);
                }
                Err(_) => {
                    let [hi, lo] = c.reference.to_be_bytes();
                    elements.extend_from_slice(&[IEI_CONCAT_16BIT, 0x04, hi, lo, c.total, c.index]);
                }
            }
        }

        if let Some(p) = &self.port {
            let [dst_hi, dst_lo] = p.dst.to_be_bytes();
            let [src_hi, src_lo] = p.src.to_be_bytes();
            elements.extend_from_slice(&[IEI_PORT_16BIT, 0x04, dst_hi, dst_lo, src_hi, src_lo]);
        }

        let mut out = Vec::with_capacity(elements.len() + 1);
        out.push(elements.len() as u8);
        out.extend_from_slice(&elements);
        out
    }
}
