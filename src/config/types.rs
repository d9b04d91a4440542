//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Bot configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Webhook listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Bot identity and defaults.
    #[serde(default)]
    pub bot: BotConfig,
    /// Outbound gateway API.
    #[serde(default)]
    pub gateway: GatewayConfig,
    /// Webhook verification.
    #[serde(default)]
    pub security: SecurityConfig,
    /// Persistent storage. Without it, records live in memory.
    pub database: Option<DatabaseConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Webhook listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP port for the webhook and `/metrics` (default: 8080).
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Nickname users address the bot by (`name, help`).
    #[serde(default)]
    pub name: Option<String>,
    /// Account id of the bot. Learned from the first event when 0.
    #[serde(default)]
    pub self_id: i64,
    /// Authority given to users seen for the first time.
    /// A negative value disables automatic user creation.
    #[serde(default = "default_authority")]
    pub default_authority: i64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: None,
            self_id: 0,
            default_authority: default_authority(),
        }
    }
}

fn default_authority() -> i64 {
    1
}

/// Outbound gateway configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the gateway HTTP API (e.g. `http://127.0.0.1:5700`).
    /// Outgoing messages are only logged when unset.
    pub send_url: Option<String>,
    /// Access token sent as `Authorization: Token <token>`.
    pub token: Option<String>,
}

/// Webhook verification configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecurityConfig {
    /// Shared secret for `X-Signature` verification.
    pub secret: Option<String>,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite file (`:memory:` for a throwaway database).
    pub path: String,
}
