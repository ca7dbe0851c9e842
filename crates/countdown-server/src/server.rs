//! HTTP server for the countdown endpoints
//!
//! Provides /, /health, and /countdown?t=UNIX_TIMESTAMP.

use crate::error::Result;
use crate::types::{HealthResponse, MessageResponse};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use countdown_cache::{CountdownCache, Renderer};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Shared state for the HTTP server
pub struct ServerState<R: Renderer> {
    pub cache: CountdownCache<R>,
    pub started_at: DateTime<Utc>,
}

impl<R: Renderer> ServerState<R> {
    pub fn new(cache: CountdownCache<R>) -> Self {
        Self {
            cache,
            started_at: Utc::now(),
        }
    }
}

pub type SharedState<R> = Arc<ServerState<R>>;

#[derive(Deserialize)]
struct CountdownParams {
    t: Option<String>,
}

/// Create the HTTP router
pub fn create_router<R: Renderer + 'static>(state: SharedState<R>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/countdown", get(get_countdown))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server<R: Renderer + 'static>(
    state: SharedState<R>,
    port: u16,
) -> std::io::Result<()> {
    let router = create_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await
}

async fn home() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Home".to_string(),
    })
}

/// Health check endpoint
async fn health<R: Renderer>(State(state): State<SharedState<R>>) -> Json<HealthResponse> {
    let uptime_secs = (Utc::now() - state.started_at).num_seconds() as u64;
    let cached_gifs = state.cache.entry_count().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs,
        cached_gifs,
    })
}

/// Serve the countdown GIF for the `t` query parameter, generating it on a
/// cache miss. Invalid input never reaches the cache.
async fn get_countdown<R: Renderer>(
    State(state): State<SharedState<R>>,
    Query(params): Query<CountdownParams>,
) -> Response {
    let t = match params.t.as_deref().and_then(|s| s.parse::<i64>().ok()) {
        Some(t) if t > 0 => t,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "Missing or invalid \"t\" query parameter (UNIX timestamp)",
            )
                .into_response();
        }
    };

    match serve_gif(&state, t).await {
        Ok(data) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/gif")
            .header(
                header::CACHE_CONTROL,
                "no-cache, no-store, must-revalidate, post-check=0, pre-check=0, max-age=0",
            )
            .header(header::PRAGMA, "no-cache")
            .header(header::EXPIRES, "-1")
            .body(Body::from(data))
            .unwrap(),
        Err(e) => {
            error!(t, error = %e, "Failed to generate or retrieve GIF");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// Resolve the artifact through the cache and read its bytes.
async fn serve_gif<R: Renderer>(state: &ServerState<R>, t: i64) -> Result<Vec<u8>> {
    let path = state.cache.get_or_generate(t).await?;
    let data = tokio::fs::read(&path).await?;
    Ok(data)
}
