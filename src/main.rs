mod backend;
mod command;
mod config;
mod data;
mod db;
#[cfg(feature = "bot")]
mod discord;
mod embed;
mod error;
mod lifecycle;
mod shop;
mod signal;
mod webhook;

use std::{env, path::PathBuf, sync::Arc, time::Duration};

use db::{JsonAccountStore, JsonShopSource};
use lifecycle::Lifecycle;
use tracing::{error, info};

fn env_path(key: &str, default: &str) -> PathBuf {
    env::var(key).unwrap_or_else(|_| default.to_owned()).into()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env variables if it exists.
    dotenvy::dotenv().ok();

    // Initialize the logger to use environment variables.
    tracing_subscriber::fmt::init();

    let config_path = env_path("DISCORD_CONFIG_PATH", "config.json");
    let clients_path = env_path("CLIENTS_PATH", "clients.json");
    let shop_path = env_path("SHOP_PATH", "shop.json");
    let poll_secs = match env::var("SHOP_POLL_SECS") {
        Ok(raw) => raw.parse::<u64>()?,
        Err(_) => 30,
    };

    let accounts = Arc::new(JsonAccountStore::new(clients_path));
    let shop = Arc::new(JsonShopSource::new(shop_path));
    let watcher = shop.watch(Duration::from_secs(poll_secs.max(1)));

    let lifecycle = match Lifecycle::start(&config_path, accounts, shop).await {
        Ok(lifecycle) => {
            info!("Discord module status: {:?}", lifecycle.status());
            Some(lifecycle)
        }
        Err(e) => {
            error!("Failed to load config, Discord integration stays disabled: {}", e);
            None
        }
    };

    signal::wait_for_signal().await;
    info!("Shutting down");

    if let Some(lifecycle) = lifecycle {
        lifecycle.shutdown().await;
    }
    watcher.abort();
    Ok(())
}
