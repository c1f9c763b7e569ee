use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use str_supply::{ConfigError, RetryPolicy, SupplyConfig};
use thiserror::Error;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Error)]
pub enum ServiceConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Supply(#[from] ConfigError),
    #[error("invalid listen address {0:?}")]
    Listen(String),
}

/// Service settings. Loaded from an optional JSON file; command line flags
/// and `PORT` are applied on top by the binary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub listen_addr: String,
    pub ledger_path: PathBuf,
    /// Keep the ledger in process memory only.
    pub in_memory: bool,
    pub supply: SupplyConfig,
    pub persist_attempts: u32,
    pub persist_backoff_ms: u64,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            ledger_path: PathBuf::from("./database.json"),
            in_memory: false,
            supply: SupplyConfig::default(),
            persist_attempts: 3,
            persist_backoff_ms: 25,
            log_format: LogFormat::Pretty,
        }
    }
}

impl ServiceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ServiceConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ServiceConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Replaces the port of `listen_addr`, keeping its host.
    pub fn set_port(&mut self, port: u16) -> Result<(), ServiceConfigError> {
        let mut addr = self.socket_addr()?;
        addr.set_port(port);
        self.listen_addr = addr.to_string();
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ServiceConfigError> {
        self.listen_addr
            .parse()
            .map_err(|_| ServiceConfigError::Listen(self.listen_addr.clone()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.persist_attempts.max(1),
            backoff: Duration::from_millis(self.persist_backoff_ms),
        }
    }

    pub fn validate(&self) -> Result<(), ServiceConfigError> {
        self.supply.validate()?;
        self.socket_addr()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: ServiceConfig = serde_json::from_str(
            r#"{"ledger_path": "/var/lib/str/ledger.json", "supply": {"total_supply": 1000}, "log_format": "json"}"#,
        )
        .unwrap();
        assert_eq!(cfg.ledger_path, PathBuf::from("/var/lib/str/ledger.json"));
        assert_eq!(cfg.supply.total_supply, 1000);
        assert_eq!(cfg.supply.base_points_per_unit, 100);
        assert_eq!(cfg.listen_addr, "0.0.0.0:3000");
        assert_eq!(cfg.log_format, LogFormat::Json);
    }

    #[test]
    fn port_override_keeps_host() {
        let mut cfg = ServiceConfig {
            listen_addr: "127.0.0.1:3000".into(),
            ..ServiceConfig::default()
        };
        cfg.set_port(8080).unwrap();
        assert_eq!(cfg.listen_addr, "127.0.0.1:8080");
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad_addr = ServiceConfig {
            listen_addr: "not-an-addr".into(),
            ..ServiceConfig::default()
        };
        assert!(matches!(bad_addr.validate(), Err(ServiceConfigError::Listen(_))));

        let mut bad_supply = ServiceConfig::default();
        bad_supply.supply.difficulty_step_amount = 0;
        assert!(matches!(bad_supply.validate(), Err(ServiceConfigError::Supply(_))));
    }

    #[test]
    fn retry_policy_has_at_least_one_attempt() {
        let cfg = ServiceConfig {
            persist_attempts: 0,
            persist_backoff_ms: 10,
            ..ServiceConfig::default()
        };
        let policy = cfg.retry_policy();
        assert_eq!(policy.attempts, 1);
        assert_eq!(policy.backoff, Duration::from_millis(10));
    }
}
