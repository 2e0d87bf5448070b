//! Configuration types for rift-mq.

mod admin;
mod broker;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use admin::{AdminConfig, LogFormat, LoggingConfig};
pub use broker::{BrokerConfig, ResponseConfig};

use crate::listener::ConsumerPoolConfig;
use crate::stub::StubRecord;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub admin: AdminConfig,
    #[serde(default)]
    pub broker: BrokerConfig,
    /// Consumer pool bounds applied to every stub subscription
    #[serde(default)]
    pub listener: ConsumerPoolConfig,
    #[serde(default)]
    pub response: ResponseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Stubs created at startup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stubs: Vec<StubRecord>,
    /// Additional stub file (YAML or JSON) loaded at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stubs_file: Option<PathBuf>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listener.max_consumers == 0 {
            anyhow::bail!("listener.max_consumers must be at least 1");
        }
        if self.listener.min_consumers > self.listener.max_consumers {
            anyhow::bail!(
                "listener.min_consumers ({}) must not exceed listener.max_consumers ({})",
                self.listener.min_consumers,
                self.listener.max_consumers
            );
        }
        if self.listener.idle_timeout.is_zero() {
            anyhow::bail!("listener.idle_timeout must be greater than 0");
        }
        if self.listener.stop_timeout.is_zero() {
            anyhow::bail!("listener.stop_timeout must be greater than 0");
        }
        if self.response.webhook_timeout_ms == 0 {
            anyhow::bail!("response.webhook_timeout_ms must be greater than 0");
        }
        for stub in &self.stubs {
            if stub.destination.name.trim().is_empty() {
                anyhow::bail!("Stub '{}' has an empty destination name", stub.label());
            }
        }
        Ok(())
    }

    /// Inline stubs followed by the ones from `stubs_file`
    pub fn initial_stubs(&self) -> Result<Vec<StubRecord>, anyhow::Error> {
        let mut stubs = self.stubs.clone();
        if let Some(ref path) = self.stubs_file {
            stubs.extend(load_stub_file(path)?);
        }
        Ok(stubs)
    }
}

/// Stub file contents: a bare list or an object with a `stubs` list
#[derive(Deserialize)]
#[serde(untagged)]
enum StubFile {
    List(Vec<StubRecord>),
    Wrapped { stubs: Vec<StubRecord> },
}

/// Load stubs from a YAML or JSON file
pub fn load_stub_file<P: AsRef<Path>>(path: P) -> Result<Vec<StubRecord>, anyhow::Error> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read stub file {}: {}", path.display(), e))?;
    let file: StubFile = serde_yaml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Invalid stub file {}: {}", path.display(), e))?;
    Ok(match file {
        StubFile::List(stubs) => stubs,
        StubFile::Wrapped { stubs } => stubs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::BrokerFlavor;
    use crate::stub::{ContentMatchType, DestinationType};
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
admin:
  port: 9000
broker:
  flavor: ibmmq
  queue_manager: QM7
listener:
  min_consumers: 2
  max_consumers: 4
  idle_timeout: 1000
response:
  webhook_timeout_ms: 2500
logging:
  format: json
stubs:
  - id: urgent
    destination: {type: QUEUE, name: ORDERS}
    contentMatch: {type: CONTAINS, pattern: URGENT}
    priority: 10
    status: ACTIVE
    response:
      payload: ACK-URGENT
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.admin.port, 9000);
        assert_eq!(config.admin.host, "0.0.0.0");
        assert_eq!(config.broker.flavor, BrokerFlavor::IbmMq);
        assert_eq!(config.broker.queue_manager, "QM7");
        assert_eq!(config.broker.max_redeliveries, 6);
        assert_eq!(config.listener.min_consumers, 2);
        assert_eq!(config.listener.idle_timeout, Duration::from_secs(1));
        assert_eq!(config.listener.stop_timeout, Duration::from_secs(10));
        assert_eq!(config.response.webhook_timeout(), Duration::from_millis(2500));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.stubs.len(), 1);
        assert_eq!(
            config.stubs[0].content_match.match_type,
            ContentMatchType::Contains
        );
        assert!(config.stubs[0].is_active());
    }

    #[test]
    fn test_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        config.validate().unwrap();
        assert_eq!(config.admin.port, 8090);
        assert_eq!(config.broker.flavor, BrokerFlavor::ActiveMq);
        assert_eq!(config.listener.min_consumers, 1);
        assert_eq!(config.listener.max_consumers, 5);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert!(config.stubs.is_empty());
    }

    #[test]
    fn test_validate_rejects_inverted_pool_bounds() {
        let yaml = "listener:\n  min_consumers: 6\n  max_consumers: 5\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_pool_timeouts() {
        for yaml in ["listener:\n  idle_timeout: 0\n", "listener:\n  stop_timeout: 0\n"] {
            let config: Config = serde_yaml::from_str(yaml).unwrap();
            assert!(config.validate().is_err(), "accepted {yaml:?}");
        }
    }

    #[test]
    fn test_validate_rejects_empty_stub_destination() {
        let yaml = "stubs:\n  - destination: {type: QUEUE, name: ''}\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "admin:\n  port: 7777").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.admin.port, 7777);
    }

    #[test]
    fn test_load_stub_file_json_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "t1", "destination": {{"type": "TOPIC", "name": "EVENTS"}}}}]"#
        )
        .unwrap();
        let stubs = load_stub_file(file.path()).unwrap();
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].destination.kind, DestinationType::Topic);
    }

    #[test]
    fn test_load_stub_file_wrapped_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "stubs:\n  - id: a\n    destination: {{type: QUEUE, name: A}}\n  - id: b\n    destination: {{type: QUEUE, name: B}}"
        )
        .unwrap();

        let config = Config {
            stubs_file: Some(file.path().to_path_buf()),
            stubs: vec![StubRecord::new(
                "inline",
                crate::stub::Destination::queue("I"),
            )],
            ..Config::default()
        };
        let ids: Vec<String> = config
            .initial_stubs()
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["inline", "a", "b"]);
    }

    #[test]
    fn test_load_stub_file_missing() {
        assert!(load_stub_file("/nonexistent/stubs.yaml").is_err());
    }
}
