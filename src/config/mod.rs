//! Configuration loading and management.
//!
//! All sections live in [`types`]; every section has defaults so an empty
//! file is a valid configuration.

mod types;

pub use types::{
    BotConfig, Config, ConfigError, DatabaseConfig, GatewayConfig, SecurityConfig, ServerConfig,
};
