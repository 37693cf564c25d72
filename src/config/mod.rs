//! # Configuration
//!
//! Meshrelay is configured from a single TOML file. Every section and field has a
//! default, so a file only needs the values that differ from them.
//!
//! ```toml
//! [meshtastic]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//!
//! [store]
//! capacity = 200
//! dedup_scope = "source"   # or "route"
//!
//! [classifier]
//! strategy = "remote"      # "static", "local" or "remote"
//! api_key = "..."
//!
//! [relay]
//! url = "https://aggregator.example.org/api/GetMessages"
//! ```
//!
//! `meshrelay init` writes a complete file with all defaults filled in.

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use tokio::fs;

use crate::dedup::DedupScope;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub meshtastic: MeshtasticConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial link to the field node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshtasticConfig {
    pub port: String,
    pub baud_rate: u32,
    /// Pause after a failed read before trying again (ms).
    pub read_retry_ms: u64,
}

impl Default for MeshtasticConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud_rate: 115200,
            read_retry_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Node id assumed when a JSON frame omits `source_node`/`current_node`.
    /// Older dashboard firmware expects "1".
    pub default_node: String,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            default_node: crate::frame::DEFAULT_NODE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub capacity: usize,
    pub dedup_scope: DedupScope,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            capacity: crate::store::DEFAULT_CAPACITY,
            dedup_scope: DedupScope::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierStrategy {
    /// Use the urgency carried in the frame, else LOW.
    #[default]
    Static,
    /// Local zero-shot keyword model.
    Local,
    /// Remote generative-text API.
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub strategy: ClassifierStrategy,
    /// generateContent endpoint of the remote model.
    pub api_url: String,
    pub api_key: String,
    /// Upper bound on a single remote classification call.
    pub timeout_seconds: u64,
    /// JSON lexicon for the local model; the built-in lexicon is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lexicon_file: Option<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            strategy: ClassifierStrategy::Static,
            api_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
                .to_string(),
            api_key: String::new(),
            timeout_seconds: 10,
            lexicon_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub enabled: bool,
    pub url: String,
    pub timeout_seconds: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "https://skainet.onrender.com/api/GetMessages".to_string(),
            timeout_seconds: 5,
        }
    }
}

/// Read-only HTTP view of recent messages and health.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("meshrelay.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;

        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let content = toml::to_string_pretty(&Config::default())
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.store.capacity == 0 {
            bail!("store.capacity must be at least 1");
        }
        if self.frame.default_node.trim().is_empty() {
            bail!("frame.default_node must not be empty");
        }
        if self.relay.enabled {
            if self.relay.timeout_seconds == 0 {
                bail!("relay.timeout_seconds must be at least 1");
            }
            if !(self.relay.url.starts_with("http://") || self.relay.url.starts_with("https://")) {
                bail!("relay.url must be an http(s) URL, got '{}'", self.relay.url);
            }
        }
        if self.classifier.strategy == ClassifierStrategy::Remote {
            if self.classifier.api_key.trim().is_empty() {
                bail!("classifier.api_key is required for the remote strategy");
            }
            if self.classifier.timeout_seconds == 0 {
                bail!("classifier.timeout_seconds must be at least 1");
            }
        }
        if self.api.enabled {
            self.api
                .bind
                .parse::<SocketAddr>()
                .map_err(|e| anyhow!("api.bind '{}' is not a socket address: {}", self.api.bind, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.store.capacity, 200);
        assert_eq!(config.relay.timeout_seconds, 5);
        assert_eq!(config.meshtastic.read_retry_ms, 2000);
        assert_eq!(config.classifier.strategy, ClassifierStrategy::Static);
        assert_eq!(config.store.dedup_scope, DedupScope::Source);
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = Config::default();
        config.store.capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn remote_strategy_requires_api_key() {
        let mut config = Config::default();
        config.classifier.strategy = ClassifierStrategy::Remote;
        assert!(config.validate().is_err());
        config.classifier.api_key = "k".into();
        config.validate().unwrap();
    }

    #[test]
    fn disabled_relay_skips_url_check() {
        let mut config = Config::default();
        config.relay.url = "not a url".into();
        assert!(config.validate().is_err());
        config.relay.enabled = false;
        config.validate().unwrap();
    }

    #[test]
    fn partial_sections_fill_in_defaults() {
        let config: Config = toml::from_str(
            r#"
            [store]
            capacity = 50
            dedup_scope = "route"

            [classifier]
            strategy = "local"
            "#,
        )
        .unwrap();
        assert_eq!(config.store.capacity, 50);
        assert_eq!(config.store.dedup_scope, DedupScope::Route);
        assert_eq!(config.classifier.strategy, ClassifierStrategy::Local);
        assert_eq!(config.classifier.timeout_seconds, 10);
        assert_eq!(config.relay.url, RelayConfig::default().url);
    }
}
