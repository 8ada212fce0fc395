//! TOML configuration. Every field has a default so the service runs with no
//! config file at all.

use anyhow::Context as _;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub oracle: OracleConfig,
    pub transport: TransportConfig,
}

impl Config {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file. `:memory:` is accepted for ephemeral runs.
    pub path: String,
    /// Which state-storage shape this deployment uses. Exactly one shape is
    /// active; switching modes on an existing database is not supported.
    pub mode: StorageMode,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "opsbot.db".to_string(),
            mode: StorageMode::Append,
        }
    }
}

/// The two state-storage shapes that survived this system's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Append-only fact history; "current" is a read-time reduction.
    Append,
    /// Flat one-row-per-entity table; history is not retained.
    Upsert,
}

impl StorageMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::Append => "append",
            StorageMode::Upsert => "upsert",
        }
    }
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// OpenAI-compatible API root, without the `/chat/completions` suffix.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key. The key itself
    /// never lives in the config file.
    pub api_key_env: String,
    /// Budget for one oracle call, connection setup included.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPSBOT_ORACLE_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Address the webhook listener binds to.
    pub bind_addr: String,
    /// Where replies are POSTed. Empty means replies are logged instead.
    pub reply_url: String,
    /// Fallback entity identity for facts that name no client or editor.
    /// Empty means the message's channel name is used instead.
    pub default_entity: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8410".to_string(),
            reply_url: String::new(),
            default_entity: String::new(),
        }
    }
}
