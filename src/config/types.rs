use serde::Deserialize;
use std::time::Duration;

use crate::session::INTERFACE_VERSION_34;
use crate::transport::MockBehavior;

/// Root configuration for esmed
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The ESME session
    pub session: SessionSection,

    /// Which transport carries the session
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging and tracing
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Shutdown behaviour
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionSection {
    /// Peer address
    #[serde(default)]
    pub connection: ConnectionConfig,

    /// bind_transceiver credentials
    pub bind: BindConfig,

    /// submit_sm defaults
    #[serde(default)]
    pub submit: SubmitConfig,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Client-side rate limit (disabled when absent)
    pub throttle: Option<ThrottleSection>,

    /// Server throttle cool-down
    #[serde(default = "default_server_cooldown", with = "humantime_serde")]
    pub server_cooldown: Duration,
}

/// Peer address
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2775
}

/// bind_transceiver parameters
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BindConfig {
    pub system_id: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub system_type: String,

    #[serde(default = "default_interface_version")]
    pub interface_version: u8,

    #[serde(default)]
    pub addr_ton: u8,

    #[serde(default)]
    pub addr_npi: u8,

    #[serde(default)]
    pub address_range: String,
}

fn default_interface_version() -> u8 {
    INTERFACE_VERSION_34
}

/// Defaults applied to every submit_sm
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SubmitConfig {
    #[serde(default)]
    pub service_type: String,

    #[serde(default)]
    pub source_addr: String,

    #[serde(default = "default_one")]
    pub source_addr_ton: u8,

    #[serde(default = "default_one")]
    pub source_addr_npi: u8,

    #[serde(default = "default_one")]
    pub dest_addr_ton: u8,

    #[serde(default = "default_one")]
    pub dest_addr_npi: u8,
}

impl Default for SubmitConfig {
    fn default() -> Self {
        Self {
            service_type: String::new(),
            source_addr: String::new(),
            source_addr_ton: 1,
            source_addr_npi: 1,
            dest_addr_ton: 1,
            dest_addr_npi: 1,
        }
    }
}

fn default_one() -> u8 {
    1
}

/// Session timers
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeoutsConfig {
    /// First reconnect delay
    #[serde(default = "default_reconnect", with = "humantime_serde")]
    pub reconnect: Duration,

    /// Later reconnect delays
    #[serde(default = "default_reconnect_long", with = "humantime_serde")]
    pub reconnect_long: Duration,

    /// enquire_link response deadline
    #[serde(default = "default_enquire_link", with = "humantime_serde")]
    pub enquire_link: Duration,

    /// Inactivity before enquire_link
    #[serde(default = "default_activity", with = "humantime_serde")]
    pub activity: Duration,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            reconnect: default_reconnect(),
            reconnect_long: default_reconnect_long(),
            enquire_link: default_enquire_link(),
            activity: default_activity(),
        }
    }
}

fn default_reconnect() -> Duration {
    Duration::from_secs(3)
}

fn default_reconnect_long() -> Duration {
    Duration::from_secs(5)
}

fn default_enquire_link() -> Duration {
    Duration::from_secs(8)
}

fn default_activity() -> Duration {
    Duration::from_secs(60)
}

fn default_server_cooldown() -> Duration {
    Duration::from_secs(60)
}

/// Token bucket parameters
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThrottleSection {
    /// Messages per period
    pub capacity: u32,

    #[serde(with = "humantime_serde")]
    pub period: Duration,
}

/// Transport selection
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    /// Settings for the in-process mock peer
    #[serde(default)]
    pub mock: MockConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// In-process simulated message center
    #[default]
    Mock,
}

/// Mock peer configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MockConfig {
    /// Default submit answer
    #[serde(default)]
    pub behavior: MockBehavior,

    /// Simulated latency
    #[serde(default, with = "humantime_serde")]
    pub latency: Duration,

    /// Peer-side rate limit answered with ESME_RTHROTTLED
    pub throttle: Option<ThrottleSection>,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Enable structured JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// OTLP endpoint for distributed tracing
    pub otlp_endpoint: Option<String>,

    /// Trace sample rate (0.0 - 1.0)
    #[serde(default = "default_sample_rate")]
    pub trace_sample_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            log_level: default_log_level(),
            otlp_endpoint: None,
            trace_sample_rate: default_sample_rate(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sample_rate() -> f64 {
    1.0
}

/// Shutdown configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ShutdownConfig {
    /// Upper bound on unbind + close
    #[serde(default = "default_shutdown_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            timeout: default_shutdown_timeout(),
        }
    }
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(1)
}

/// Humantime serde support module
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
