//! Immutable session configuration.

use std::time::Duration;

use crate::classifier::DEFAULT_COOLDOWN;
use crate::encoder::SubmitDefaults;
use crate::throttle::ThrottleConfig;
use crate::transport::{BindParams, ConnectTarget};

/// SMPP v3.4
pub const INTERFACE_VERSION_34: u8 = 0x34;

/// Session timers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Delay before the first reconnect after a failure
    pub reconnect: Duration,
    /// Delay before every later consecutive reconnect
    pub reconnect_long: Duration,
    /// enquire_link response deadline
    pub enquire_link: Duration,
    /// Inactivity before an enquire_link is sent
    pub activity: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            reconnect: Duration::from_secs(3),
            reconnect_long: Duration::from_secs(5),
            enquire_link: Duration::from_secs(8),
            activity: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub target: ConnectTarget,
    pub bind: BindParams,
    pub submit: SubmitDefaults,
    pub timeouts: Timeouts,
    /// Client-side rate limit; `None` admits everything
    pub throttle: Option<ThrottleConfig>,
    /// Server throttle cool-down window
    pub server_cooldown: Duration,
}

impl SessionConfig {
    /// Defaults for everything except the peer and credentials.
    pub fn new(target: ConnectTarget, system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            target,
            bind: BindParams {
                system_id: system_id.into(),
                password: password.into(),
                system_type: String::new(),
                interface_version: INTERFACE_VERSION_34,
                addr_ton: 0,
                addr_npi: 0,
                address_range: String::new(),
            },
            submit: SubmitDefaults {
                service_type: String::new(),
                source_addr: String::new(),
                source_addr_ton: 1,
                source_addr_npi: 1,
                dest_addr_ton: 1,
                dest_addr_npi: 1,
            },
            timeouts: Timeouts::default(),
            throttle: None,
            server_cooldown: DEFAULT_COOLDOWN,
        }
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = Some(throttle);
        self
    }
}
