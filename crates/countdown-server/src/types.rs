//! Core types for the countdown server

use serde::Serialize;
use std::path::PathBuf;

/// Configuration for the countdown server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub gif_dir: PathBuf,
    pub cache_file: PathBuf,
    pub render_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            gif_dir: PathBuf::from("./gifs"),
            cache_file: PathBuf::from("./cache.json"),
            render_timeout_secs: 30,
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
    pub cached_gifs: usize,
}

/// Body of the home route
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
