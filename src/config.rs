//! # Market Configuration
//!
//! Configuration for ledger access, registration policy and the ambient
//! pieces around them. Supports config files and environment overrides.
//!
//! Precedence (highest to lowest):
//! 1. `CHANNEL_NAME` / `CHAINCODE_NAME`
//! 2. `MARKET__<SECTION>__<KEY>` environment variables
//! 3. Config file (`./taskmarket.toml`, `./config/taskmarket.toml` or an explicit path)
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::ledger::{DEFAULT_CHAINCODE, DEFAULT_CHANNEL};
use crate::error::{MarketError, MarketResult};
use crate::models::AccountFlags;

/// Top-level configuration
///
/// # Examples
///
/// ```rust
/// use taskmarket_core::config::{MarketConfig, RegistrationPolicy};
///
/// let config = MarketConfig::default();
/// assert_eq!(config.ledger.channel, "mychannel");
/// assert_eq!(config.registration, RegistrationPolicy::RequireApproval);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    pub ledger: LedgerConfig,
    pub gateway: GatewayConfig,
    pub registration: RegistrationPolicy,
    pub cache: CacheConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub ca: CaConfig,
}

/// Channel, chaincode and per-call bounds
///
/// The gateway stops waiting on a submit after [`submit_budget`](Self::submit_budget)
/// and drops the call, which a gRPC client turns into a cancellation. Keep
/// the budget at least as long as the ledger's own endorse plus commit
/// timeouts so a proposal is never cancelled after endorsement started.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub channel: String,
    pub chaincode: String,
    pub evaluate_timeout_ms: u64,
    pub endorse_timeout_ms: u64,
    pub submit_timeout_ms: u64,
    pub commit_status_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            chaincode: DEFAULT_CHAINCODE.to_string(),
            evaluate_timeout_ms: 5_000,
            endorse_timeout_ms: 15_000,
            submit_timeout_ms: 5_000,
            commit_status_timeout_ms: 60_000,
        }
    }
}

impl LedgerConfig {
    pub fn evaluate_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluate_timeout_ms)
    }

    /// Upper bound on a whole submit: endorse, order, then wait for commit status
    pub fn submit_budget(&self) -> Duration {
        Duration::from_millis(
            self.endorse_timeout_ms + self.submit_timeout_ms + self.commit_status_timeout_ms,
        )
    }
}

/// Identity and peer settings for the connection factory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub msp_id: String,
    pub crypto_path: PathBuf,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub tls_cert_path: PathBuf,
    pub peer_endpoint: String,
    pub gateway_peer: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let admin = PathBuf::from("/tmp/hyperledger/org1/admin");
        Self {
            msp_id: "org1MSP".to_string(),
            cert_path: admin.join("msp").join("signcerts"),
            key_path: admin.join("msp").join("keystore"),
            crypto_path: admin,
            tls_cert_path: PathBuf::from(
                "/tmp/hyperledger/org1/peer1/tls-msp/tlscacerts/tls-0-0-0-0-7052.pem",
            ),
            peer_endpoint: "dns:///localhost:7051".to_string(),
            gateway_peer: "peer1-org1".to_string(),
        }
    }
}

/// Approval flags written at registration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// New accounts start unverified and unaccepted; an admin approves them
    #[default]
    RequireApproval,
    /// New accounts are created as verified, accepted administrators
    AutoApprove,
}

impl RegistrationPolicy {
    /// Flags written for a new account
    pub fn initial_flags(&self) -> AccountFlags {
        let approved = matches!(self, Self::AutoApprove);
        AccountFlags {
            is_admin: approved,
            is_verified: approved,
            is_accepted: approved,
        }
    }
}

/// Read-through user snapshot cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 2_000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Fail-fast guard in front of the ledger port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    /// Consecutive transport failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing
    pub open_timeout_ms: u64,
    /// Successful probes needed to close again
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            failure_threshold: 5,
            open_timeout_ms: 30_000,
            success_threshold: 2,
        }
    }
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

/// External certificate authority tooling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaConfig {
    pub client_binary: String,
    pub openssl_binary: String,
    pub ca_host: String,
    /// Directory under which enrolled identities are written (`<root>/<org>/<user>`)
    pub identity_root: PathBuf,
    /// Root of the network's crypto material (`<root>/<org>/peer1/...`)
    pub crypto_root: PathBuf,
    pub ca_ports: HashMap<String, u16>,
    pub peer_ports: HashMap<String, u16>,
}

impl Default for CaConfig {
    fn default() -> Self {
        Self {
            client_binary: "fabric-ca-client".to_string(),
            openssl_binary: "openssl".to_string(),
            ca_host: "0.0.0.0".to_string(),
            identity_root: PathBuf::from("."),
            crypto_root: PathBuf::from("/tmp/hyperledger"),
            ca_ports: HashMap::from([("org1".to_string(), 7054), ("org2".to_string(), 7055)]),
            peer_ports: HashMap::from([("org1".to_string(), 7051), ("org2".to_string(), 9051)]),
        }
    }
}

impl MarketConfig {
    /// Load configuration from the first config file found plus environment
    pub fn load() -> MarketResult<Self> {
        let path = Self::find_config_file();
        Self::load_from(path.as_deref())
    }

    /// Load configuration from a specific file (or none) plus environment
    pub fn load_from(path: Option<&Path>) -> MarketResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            debug!("Loading config from: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("MARKET")
                .prefix_separator("__")
                .separator("__"),
        );

        let mut loaded: Self = builder.build()?.try_deserialize()?;
        loaded.apply_env_overrides_from(|key| std::env::var(key).ok());
        loaded.validate()?;

        debug!(config = %loaded.sanitized(), "Loaded market configuration");
        Ok(loaded)
    }

    /// Find the config file in standard locations
    fn find_config_file() -> Option<PathBuf> {
        ["./taskmarket.toml", "./config/taskmarket.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    /// Apply the short-form channel/chaincode overrides used by network scripts
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(channel) = lookup("CHANNEL_NAME").filter(|v| !v.is_empty()) {
            self.ledger.channel = channel;
        }
        if let Some(chaincode) = lookup("CHAINCODE_NAME").filter(|v| !v.is_empty()) {
            self.ledger.chaincode = chaincode;
        }
    }

    /// Reject configurations no deployment could run with
    pub fn validate(&self) -> MarketResult<()> {
        if self.ledger.channel.trim().is_empty() {
            return Err(MarketError::Configuration("ledger.channel is empty".to_string()));
        }
        if self.ledger.chaincode.trim().is_empty() {
            return Err(MarketError::Configuration("ledger.chaincode is empty".to_string()));
        }

        let timeouts = [
            ("evaluate_timeout_ms", self.ledger.evaluate_timeout_ms),
            ("endorse_timeout_ms", self.ledger.endorse_timeout_ms),
            ("submit_timeout_ms", self.ledger.submit_timeout_ms),
            ("commit_status_timeout_ms", self.ledger.commit_status_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(MarketError::Configuration(format!("ledger.{name} must be positive")));
        }

        if self.circuit_breaker.enabled
            && (self.circuit_breaker.failure_threshold == 0
                || self.circuit_breaker.success_threshold == 0)
        {
            return Err(MarketError::Configuration(
                "circuit_breaker thresholds must be positive when enabled".to_string(),
            ));
        }

        if self.cache.enabled && self.cache.ttl_ms == 0 {
            return Err(MarketError::Configuration(
                "cache.ttl_ms must be positive when the cache is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// JSON view of the configuration with key material locations masked
    pub fn sanitized(&self) -> serde_json::Value {
        let mut value = serde_json::to_value(self).unwrap_or(serde_json::Value::Null);
        if let Some(gateway) = value.get_mut("gateway").and_then(|g| g.as_object_mut()) {
            gateway.insert("key_path".to_string(), serde_json::json!("[redacted]"));
        }
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file() -> NamedTempFile {
        tempfile::Builder::new().suffix(".toml").tempfile().unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = MarketConfig::default();
        assert_eq!(config.ledger.chaincode, "mycc");
        assert_eq!(config.ledger.evaluate_timeout(), Duration::from_secs(5));
        assert_eq!(config.ledger.submit_budget(), Duration::from_secs(80));
        assert!(!config.circuit_breaker.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = toml_file();
        writeln!(
            file,
            r#"
registration = "auto_approve"

[ledger]
channel = "marketchannel"
evaluate_timeout_ms = 1500

[circuit_breaker]
enabled = true
failure_threshold = 3
"#
        )
        .unwrap();

        let config = MarketConfig::load_from(Some(file.path())).unwrap();
        assert_eq!(config.registration, RegistrationPolicy::AutoApprove);
        assert_eq!(config.ledger.evaluate_timeout_ms, 1500);
        // untouched keys keep their defaults
        assert_eq!(config.ledger.commit_status_timeout_ms, 60_000);
        assert!(config.circuit_breaker.enabled);
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.circuit_breaker.success_threshold, 2);
        assert_eq!(config.ca.ca_ports.get("org2"), Some(&7055));
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let mut file = toml_file();
        writeln!(file, "[ledger]\nsubmit_timeout_ms = 0").unwrap();

        let err = MarketConfig::load_from(Some(file.path())).unwrap_err();
        assert!(matches!(err, MarketError::Configuration(_)));
        assert!(err.to_string().contains("submit_timeout_ms"));
    }

    #[test]
    fn test_short_form_env_overrides() {
        let mut config = MarketConfig::default();
        config.apply_env_overrides_from(|key| match key {
            "CHANNEL_NAME" => Some("tasks".to_string()),
            "CHAINCODE_NAME" => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.ledger.channel, "tasks");
        assert_eq!(config.ledger.chaincode, "mycc");
    }

    #[test]
    fn test_registration_policy_flags() {
        assert_eq!(
            RegistrationPolicy::RequireApproval.initial_flags(),
            AccountFlags::default()
        );
        let approved = RegistrationPolicy::AutoApprove.initial_flags();
        assert!(approved.is_admin && approved.is_verified && approved.is_accepted);
    }

    #[test]
    fn test_sanitized_masks_key_path() {
        let sanitized = MarketConfig::default().sanitized();
        assert_eq!(sanitized["gateway"]["key_path"], "[redacted]");
        assert_eq!(sanitized["ledger"]["channel"], "mychannel");
    }
}
