//! Registered delivery (delivery receipt) request flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const FINAL: u8 = 0x01;
pub const FAILURE: u8 = 0x02;
pub const SUCCESS: u8 = 0x03;
pub const DELIVERY_ACKNOWLEDGEMENT: u8 = 0x04;
pub const USER_ACKNOWLEDGEMENT: u8 = 0x08;
pub const INTERMEDIATE: u8 = 0x10;

/// Bits 0-1 select the receipt kind; they are a value, not independent flags.
const RECEIPT_MASK: u8 = 0x03;

/// Delivery receipt selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Receipt {
    /// Receipt on final delivery outcome, success or failure
    Final,
    /// Receipt only on failure
    Failure,
    /// Receipt only on success (SMPP 5.0)
    Success,
}

impl Receipt {
    pub fn bits(self) -> u8 {
        match self {
            Self::Final => FINAL,
            Self::Failure => FAILURE,
            Self::Success => SUCCESS,
        }
    }
}

impl FromStr for Receipt {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "final" => Ok(Self::Final),
            "failure" => Ok(Self::Failure),
            "success" => Ok(Self::Success),
            other => Err(format!("unknown receipt kind: {}", other)),
        }
    }
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Final => "final",
            Self::Failure => "failure",
            Self::Success => "success",
        })
    }
}

/// Delivery report request attached to an outbound message.
///
/// The receipt kind can be given either as `receipt` or with the boolean
/// `final`/`failure`/`success` flags. Receipt kinds are mutually exclusive:
/// they are applied in the order `receipt`, `final`, `failure`, `success`
/// and the last one set wins. The acknowledgement flags are OR-ed on top.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,

    #[serde(default)]
    pub r#final: bool,

    #[serde(default)]
    pub failure: bool,

    #[serde(default)]
    pub success: bool,

    /// SME delivery acknowledgement
    #[serde(default)]
    pub ack: bool,

    /// SME manual/user acknowledgement
    #[serde(default)]
    pub user_ack: bool,

    /// Intermediate notification
    #[serde(default)]
    pub intermediate: bool,
}

impl Report {
    /// Receipt kind after last-wins resolution.
    pub fn resolved_receipt(&self) -> Option<Receipt> {
        let mut receipt = self.receipt;
        if self.r#final {
            receipt = Some(Receipt::Final);
        }
        if self.failure {
            receipt = Some(Receipt::Failure);
        }
        if self.success {
            receipt = Some(Receipt::Success);
        }
        receipt
    }

    /// The `registered_delivery` byte.
    pub fn mask(&self) -> u8 {
        let mut flags = self.resolved_receipt().map(Receipt::bits).unwrap_or(0) & RECEIPT_MASK;
        if self.ack {
            flags |= DELIVERY_ACKNOWLEDGEMENT;
        }
        if self.user_ack {
            flags |= USER_ACKNOWLEDGEMENT;
        }
        if self.intermediate {
            flags |= INTERMEDIATE;
        }
        flags
    }
}

/// `registered_delivery` for an optional report; no report means no receipts.
pub fn registered_delivery(report: Option<&Report>) -> u8 {
    report.map(Report::mask).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_report_is_zero() {
        assert_eq!(registered_delivery(None), 0);
        assert_eq!(registered_delivery(Some(&Report::default())), 0);
    }

    #[test]
    fn test_receipt_selector_values() {
        let report = |receipt| Report {
            receipt: Some(receipt),
            ..Default::default()
        };
        assert_eq!(report(Receipt::Final).mask(), 0x01);
        assert_eq!(report(Receipt::Failure).mask(), 0x02);
        assert_eq!(report(Receipt::Success).mask(), 0x03);
    }

    #[test]
    fn test_ack_flags_combine() {
        let report = Report {
            receipt: Some(Receipt::Failure),
            ack: true,
            user_ack: true,
            intermediate: true,
            ..Default::default()
        };
        assert_eq!(report.mask(), 0x02 | 0x04 | 0x08 | 0x10);
    }

    #[test]
    fn test_multiple_receipt_kinds_last_wins() {
        // final | failure would read as 0x03 (success) if OR-ed; last-wins gives failure
        let report = Report {
            r#final: true,
            failure: true,
            ..Default::default()
        };
        assert_eq!(report.resolved_receipt(), Some(Receipt::Failure));
        assert_eq!(report.mask(), FAILURE);

        let report = Report {
            receipt: Some(Receipt::Failure),
            r#final: true,
            ..Default::default()
        };
        assert_eq!(report.mask(), FINAL);

        let report = Report {
            r#final: true,
            failure: true,
            success: true,
            ack: true,
            ..Default::default()
        };
        assert_eq!(report.mask(), SUCCESS | DELIVERY_ACKNOWLEDGEMENT);
    }

    #[test]
    fn test_receipt_from_str() {
        assert_eq!("FINAL".parse::<Receipt>().unwrap(), Receipt::Final);
        assert!("always".parse::<Receipt>().is_err());
    }
}
