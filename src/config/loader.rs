use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::types::{Config, ThrottleSection, TransportKind};
use crate::encoder::SubmitDefaults;
use crate::session::{SessionConfig, Timeouts};
use crate::telemetry::TracingConfig;
use crate::throttle::ThrottleConfig;
use crate::transport::{BindParams, ConnectTarget, Connector, MockSmsc};

/// SMPP field limits (without the terminating NUL)
const MAX_SYSTEM_ID_LEN: usize = 15;
const MAX_PASSWORD_LEN: usize = 8;

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .context("failed to parse YAML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let session = &self.session;

        if session.connection.host.trim().is_empty() {
            anyhow::bail!("session.connection.host must not be empty");
        }
        if session.connection.port == 0 {
            anyhow::bail!("session.connection.port must not be 0");
        }

        if session.bind.system_id.is_empty() {
            anyhow::bail!("session.bind.system_id must not be empty");
        }
        if session.bind.system_id.len() > MAX_SYSTEM_ID_LEN {
            anyhow::bail!(
                "session.bind.system_id longer than {} characters",
                MAX_SYSTEM_ID_LEN
            );
        }
        if session.bind.password.len() > MAX_PASSWORD_LEN {
            anyhow::bail!(
                "session.bind.password longer than {} characters",
                MAX_PASSWORD_LEN
            );
        }

        if session.timeouts.activity.is_zero() {
            anyhow::bail!("session.timeouts.activity must be greater than zero");
        }
        if session.timeouts.enquire_link.is_zero() {
            anyhow::bail!("session.timeouts.enquire_link must be greater than zero");
        }

        if let Some(throttle) = &session.throttle {
            validate_throttle("session.throttle", throttle)?;
        }
        if let Some(throttle) = &self.transport.mock.throttle {
            validate_throttle("transport.mock.throttle", throttle)?;
        }

        if !(0.0..=1.0).contains(&self.telemetry.trace_sample_rate) {
            anyhow::bail!("telemetry.trace_sample_rate must be between 0.0 and 1.0");
        }

        info!("configuration validated successfully");
        Ok(())
    }

    /// Build the immutable session configuration.
    pub fn session_config(&self) -> SessionConfig {
        let s = &self.session;

        SessionConfig {
            target: ConnectTarget::new(s.connection.host.clone(), s.connection.port),
            bind: BindParams {
                system_id: s.bind.system_id.clone(),
                password: s.bind.password.clone(),
                system_type: s.bind.system_type.clone(),
                interface_version: s.bind.interface_version,
                addr_ton: s.bind.addr_ton,
                addr_npi: s.bind.addr_npi,
                address_range: s.bind.address_range.clone(),
            },
            submit: SubmitDefaults {
                service_type: s.submit.service_type.clone(),
                source_addr: s.submit.source_addr.clone(),
                source_addr_ton: s.submit.source_addr_ton,
                source_addr_npi: s.submit.source_addr_npi,
                dest_addr_ton: s.submit.dest_addr_ton,
                dest_addr_npi: s.submit.dest_addr_npi,
            },
            timeouts: Timeouts {
                reconnect: s.timeouts.reconnect,
                reconnect_long: s.timeouts.reconnect_long,
                enquire_link: s.timeouts.enquire_link,
                activity: s.timeouts.activity,
            },
            throttle: s.throttle.map(throttle_config),
            server_cooldown: s.server_cooldown,
        }
    }

    /// Build the connector named in `transport.kind`.
    ///
    /// The mock accepts the session's own credentials.
    pub fn connector(&self) -> Arc<dyn Connector> {
        match self.transport.kind {
            TransportKind::Mock => {
                let mock = &self.transport.mock;
                let mut smsc = MockSmsc::new(
                    self.session.bind.system_id.clone(),
                    self.session.bind.password.clone(),
                )
                .with_behavior(mock.behavior.clone())
                .with_latency(mock.latency);
                if let Some(throttle) = mock.throttle {
                    smsc = smsc.with_throttle(throttle_config(throttle));
                }
                Arc::new(smsc)
            }
        }
    }

    pub fn tracing_config(&self) -> TracingConfig {
        TracingConfig {
            service_name: "esmed".to_string(),
            log_level: self.telemetry.log_level.clone(),
            json_logs: self.telemetry.json_logs,
            otlp_endpoint: self.telemetry.otlp_endpoint.clone(),
            sample_rate: self.telemetry.trace_sample_rate,
        }
    }
}

fn validate_throttle(section: &str, throttle: &ThrottleSection) -> Result<()> {
    if throttle.capacity == 0 {
        anyhow::bail!("{}.capacity must be greater than zero", section);
    }
    if throttle.period.is_zero() {
        anyhow::bail!("{}.period must be greater than zero", section);
    }
    Ok(())
}

fn throttle_config(t: ThrottleSection) -> ThrottleConfig {
    ThrottleConfig::new(t.capacity, t.period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockBehavior;
    use std::time::Duration;

    #[test]
    fn test_minimal_config() {
        let yaml = r#"
session:
  bind:
    system_id: esme
    password: secret
"#;

        let config = Config::from_yaml(yaml).unwrap();
        let session = config.session_config();

        assert_eq!(session.target, ConnectTarget::new("127.0.0.1", 2775));
        assert_eq!(session.bind.interface_version, 0x34);
        assert_eq!(session.bind.addr_ton, 0);
        assert_eq!(session.submit.source_addr_ton, 1);
        assert_eq!(session.submit.dest_addr_npi, 1);
        assert_eq!(session.timeouts, Timeouts::default());
        assert_eq!(session.server_cooldown, Duration::from_secs(60));
        assert!(session.throttle.is_none());
        assert_eq!(config.shutdown.timeout, Duration::from_secs(1));
        assert_eq!(config.transport.kind, TransportKind::Mock);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
session:
  connection:
    host: smsc.example.com
    port: 2776
  bind:
    system_id: esme
    password: secret
    system_type: VMA
    interface_version: 0x34
    addr_ton: 1
    address_range: "^258"
  submit:
    source_addr: INFO
    source_addr_ton: 5
    source_addr_npi: 0
  timeouts:
    reconnect: 3s
    reconnect_long: 10s
    enquire_link: 3s
    activity: 30s
  throttle:
    capacity: 20
    period: 1s
  server_cooldown: 2m

transport:
  kind: mock
  mock:
    behavior:
      type: error
      code: 69
    latency: 5ms
    throttle:
      capacity: 5
      period: 1s

telemetry:
  log_level: debug
  json_logs: true
  trace_sample_rate: 0.5

shutdown:
  timeout: 2s
"#;

        let config = Config::from_yaml(yaml).unwrap();
        let session = config.session_config();

        assert_eq!(session.target.url(), "smpp://smsc.example.com:2776");
        assert_eq!(session.bind.system_type, "VMA");
        assert_eq!(session.bind.address_range, "^258");
        assert_eq!(session.submit.source_addr, "INFO");
        assert_eq!(session.submit.source_addr_ton, 5);
        assert_eq!(session.timeouts.reconnect_long, Duration::from_secs(10));
        assert_eq!(
            session.throttle,
            Some(ThrottleConfig::new(20, Duration::from_secs(1)))
        );
        assert_eq!(session.server_cooldown, Duration::from_secs(120));
        assert_eq!(config.transport.mock.behavior, MockBehavior::Error { code: 69 });
        assert_eq!(config.transport.mock.latency, Duration::from_millis(5));
        assert!(config.tracing_config().json_logs);
        assert_eq!(config.shutdown.timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_mock_behavior_forms() {
        let base = "session:\n  bind:\n    system_id: esme\ntransport:\n  mock:\n    behavior:\n";

        let config = Config::from_yaml(&format!("{}      type: success\n", base)).unwrap();
        assert_eq!(config.transport.mock.behavior, MockBehavior::Success);

        let config =
            Config::from_yaml(&format!("{}      type: error\n      code: 88\n", base)).unwrap();
        assert_eq!(config.transport.mock.behavior, MockBehavior::Error { code: 88 });

        assert!(Config::from_yaml(&format!("{}      type: error\n", base)).is_err());
        assert!(Config::from_yaml(&format!("{}      type: flaky\n", base)).is_err());
    }

    #[test]
    fn test_missing_bind_rejected() {
        assert!(Config::from_yaml("session: {}\n").is_err());
    }

    #[test]
    fn test_validation_rules() {
        let cases = [
            "session:\n  connection:\n    host: ''\n  bind:\n    system_id: esme\n",
            "session:\n  connection:\n    port: 0\n  bind:\n    system_id: esme\n",
            "session:\n  bind:\n    system_id: ''\n",
            "session:\n  bind:\n    system_id: averyveryverylongid\n",
            "session:\n  bind:\n    system_id: esme\n    password: toolongpw\n",
            "session:\n  bind:\n    system_id: esme\n  timeouts:\n    activity: 0s\n",
            "session:\n  bind:\n    system_id: esme\n  timeouts:\n    enquire_link: 0s\n",
            "session:\n  bind:\n    system_id: esme\n  throttle:\n    capacity: 0\n    period: 1s\n",
            "session:\n  bind:\n    system_id: esme\n  throttle:\n    capacity: 1\n    period: 0s\n",
        ];

        for yaml in cases {
            assert!(Config::from_yaml(yaml).is_err(), "accepted: {}", yaml);
        }
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = "session:\n  bind:\n    system_id: esme\n  reconnect: 3s\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_bad_duration_rejected() {
        let yaml = "session:\n  bind:\n    system_id: esme\n  server_cooldown: soon\n";
        assert!(Config::from_yaml(yaml).is_err());
    }
}
