//! Countdown GIF server
//!
//! Serves animated countdown GIFs over HTTP, reusing a cached GIF whenever
//! one already exists for a close enough target timestamp.

mod error;
mod render;
mod server;
mod types;

use crate::error::{Result, ServerError};
use crate::render::GifRenderer;
use crate::server::{start_server, ServerState, SharedState};
use crate::types::ServerConfig;
use countdown_cache::{CountdownCache, IndexStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter = EnvFilter::from_default_env().add_directive("countdown_server=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting countdown server...");

    // Load configuration from environment
    let config = load_config();
    info!("Port: {}", config.port);
    info!("GIF dir: {:?}", config.gif_dir);
    info!("Cache file: {:?}", config.cache_file);
    info!("Render timeout: {} seconds", config.render_timeout_secs);

    // Create the generation cache around the GIF renderer
    let cache = CountdownCache::new(
        IndexStore::new(config.cache_file),
        config.gif_dir,
        GifRenderer,
        Duration::from_secs(config.render_timeout_secs),
    );
    cache.init().await?;

    // Create shared state
    let state: SharedState<GifRenderer> = Arc::new(ServerState::new(cache));

    // Start HTTP server (blocking)
    start_server(state, config.port)
        .await
        .map_err(|e| ServerError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

fn load_config() -> ServerConfig {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|s| s.parse::<u16>().ok())
        .unwrap_or(3000);

    let gif_dir = std::env::var("GIF_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./gifs"));

    let cache_file = std::env::var("CACHE_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./cache.json"));

    let render_timeout_secs = std::env::var("RENDER_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(30);

    ServerConfig {
        port,
        gif_dir,
        cache_file,
        render_timeout_secs,
    }
}
