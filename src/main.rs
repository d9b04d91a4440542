//! cqbot - webhook daemon.
//!
//! Receives gateway events over HTTP and answers through the gateway API.

use cqbot::config::Config;
use cqbot::{App, AppOptions, Database, HttpSender, LogSender, MemoryStore, Sender, Store};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        name = config.bot.name.as_deref().unwrap_or("-"),
        self_id = config.bot.self_id,
        port = config.server.port,
        "Starting cqbot"
    );

    cqbot::metrics::init();

    let store: Arc<dyn Store> = match &config.database {
        Some(database) => Arc::new(Database::new(&database.path).await?),
        None => {
            warn!("No [database] configured; records are kept in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let sender: Arc<dyn Sender> = match &config.gateway.send_url {
        Some(url) => Arc::new(HttpSender::new(url.clone(), config.gateway.token.clone())),
        None => {
            warn!("No gateway send_url configured; outgoing messages are only logged");
            Arc::new(LogSender)
        }
    };

    if config.security.secret.is_none() {
        warn!("No webhook secret configured; events are accepted unsigned");
    }

    let app = App::new(AppOptions::from(&config), store, sender)?;

    cqbot::http::serve(app, config.server.port, config.security.secret.clone()).await?;
    Ok(())
}
