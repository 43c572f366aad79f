//! Configuration management for the guardian node.
//!
//! TOML file with `[node]`, `[chain]`, `[network]` and `[logging]` sections.
//! On first run `load_or_create` writes the defaults to disk.

use crate::constants::network::{DEFAULT_DIAL_TIMEOUT_SECS, DEFAULT_MAX_PEERS, DEFAULT_P2P_PORT};
use crate::constants::protocol::{protocol_length, KLAY65};
use crate::error::AppError;
use crate::network::NodeKey;
use crate::protocol::ChainParams;
use crate::types::parse_hash;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub node: NodeConfig,
    pub chain: ChainConfig,
    pub network: NetworkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub name: String,
    /// Hex-encoded ed25519 seed; a fresh key is generated when absent
    #[serde(default)]
    pub node_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainConfig {
    pub network_id: u64,
    /// Decimal string, may exceed u64
    pub chain_id: String,
    pub genesis_hash: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: u32,
}

fn default_protocol_version() -> u32 {
    KLAY65
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub listen_address: String,
    pub max_peers: usize,
    #[serde(default)]
    pub bootstrap_peers: Vec<String>,
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: u64,
}

fn default_dial_timeout() -> u64 {
    DEFAULT_DIAL_TIMEOUT_SECS
}

impl NetworkConfig {
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub output: String,
    pub file_path: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            file_path: "./logs/guardian.log".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> Result<Self, AppError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("failed to parse {}: {}", path, e)))?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> Result<(), AppError> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Load `path`, writing the default config there first if it is missing
    pub fn load_or_create(path: &str) -> Result<Self, AppError> {
        if Path::new(path).exists() {
            return Self::load_from_file(path);
        }
        let config = Self::default();
        config.save_to_file(path)?;
        tracing::info!("📝 Created default config at {}", path);
        Ok(config)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn default() -> Self {
        Self {
            node: NodeConfig {
                name: "guardian".to_string(),
                node_key: None,
            },
            chain: ChainConfig {
                network_id: 8217,
                chain_id: "8217".to_string(),
                genesis_hash: format!("0x{}", "00".repeat(32)),
                protocol_version: KLAY65,
            },
            network: NetworkConfig {
                listen_address: format!("0.0.0.0:{}", DEFAULT_P2P_PORT),
                max_peers: DEFAULT_MAX_PEERS,
                bootstrap_peers: vec![],
                dial_timeout_secs: DEFAULT_DIAL_TIMEOUT_SECS,
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Resolve the `[chain]` section into typed handshake parameters
    pub fn chain_params(&self) -> Result<ChainParams, AppError> {
        let chain_id = BigUint::parse_bytes(self.chain.chain_id.trim().as_bytes(), 10)
            .ok_or_else(|| {
                AppError::Config(format!("invalid chain_id: {:?}", self.chain.chain_id))
            })?;
        let genesis = parse_hash(&self.chain.genesis_hash)
            .map_err(|e| AppError::Config(format!("invalid genesis_hash: {}", e)))?;
        Ok(ChainParams::new(self.chain.network_id, chain_id, genesis))
    }

    pub fn protocol_version(&self) -> Result<u32, AppError> {
        let version = self.chain.protocol_version;
        match protocol_length(version) {
            Some(_) => Ok(version),
            None => Err(AppError::Config(format!(
                "unsupported protocol_version {}",
                version
            ))),
        }
    }

    pub fn node_key(&self) -> Result<NodeKey, AppError> {
        match &self.node.node_key {
            Some(seed) => NodeKey::from_hex(seed).map_err(AppError::Config),
            None => Ok(NodeKey::generate()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("guardian.toml");
        let path = path.to_str().unwrap();

        let mut config = Config::default();
        config.chain.network_id = 1000;
        config.network.bootstrap_peers = vec!["127.0.0.1:32323".to_string()];
        config.save_to_file(path).unwrap();

        assert_eq!(Config::load_from_file(path).unwrap(), config);
    }

    #[test]
    fn test_load_or_create_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("guardian.toml");
        let path = path.to_str().unwrap();

        let config = Config::load_or_create(path).unwrap();
        assert_eq!(config, Config::default());
        assert!(Path::new(path).exists());
    }

    #[test]
    fn test_optional_fields_defaulted() {
        let toml = r#"
[node]
name = "n1"

[chain]
network_id = 1000
chain_id = "8217"
genesis_hash = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"

[network]
listen_address = "127.0.0.1:0"
max_peers = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.chain.protocol_version, 65);
        assert_eq!(config.network.dial_timeout_secs, DEFAULT_DIAL_TIMEOUT_SECS);
        assert_eq!(config.logging, LoggingConfig::default());

        let params = config.chain_params().unwrap();
        assert_eq!(params.network_id, 1000);
        assert_eq!(params.chain_id, BigUint::from(8217u32));
        assert_eq!(params.genesis, [0xAA; 32]);
    }

    #[test]
    fn test_large_chain_id() {
        let mut config = Config::default();
        config.chain.chain_id = "340282366920938463463374607431768211456".to_string();
        let params = config.chain_params().unwrap();
        assert_eq!(params.chain_id, BigUint::from(1u8) << 128usize);
    }

    #[test]
    fn test_invalid_chain_values_rejected() {
        let mut config = Config::default();
        config.chain.chain_id = "12ab".to_string();
        assert!(matches!(config.chain_params(), Err(AppError::Config(_))));

        let mut config = Config::default();
        config.chain.genesis_hash = "0x1234".to_string();
        assert!(matches!(config.chain_params(), Err(AppError::Config(_))));

        let mut config = Config::default();
        config.chain.protocol_version = 61;
        assert!(matches!(config.protocol_version(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_node_key_from_config() {
        let mut config = Config::default();
        config.node.node_key = Some("11".repeat(32));
        let a = config.node_key().unwrap();
        let b = config.node_key().unwrap();
        assert_eq!(a.peer_id(), b.peer_id());

        config.node.node_key = Some("zz".to_string());
        assert!(config.node_key().is_err());
    }
}
