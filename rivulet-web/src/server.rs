//! Axum server assembly for the Rivulet HTTP API.
//!
//! Builds the router, wires shared state, and runs the listener. All
//! request handling is delegated to the `handlers` module.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use rivulet_core::RivuletConfig;
use rivulet_core::overlay::{MemoryOverlayStore, OverlayStore};
use rivulet_core::streaming::{FfmpegTranscoder, StreamManager};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::handlers::{overlays, stream, system};

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub streams: Arc<StreamManager>,
    pub overlays: Arc<dyn OverlayStore>,
    pub server_started_at: std::time::Instant,
}

impl AppState {
    pub fn new(streams: Arc<StreamManager>, overlays: Arc<dyn OverlayStore>) -> Self {
        Self {
            streams,
            overlays,
            server_started_at: std::time::Instant::now(),
        }
    }
}

/// Builds the full API router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(system::health_check))
        .route("/api/docs", get(system::api_docs))
        // Stream lifecycle
        .route("/api/stream/convert", post(stream::convert_stream))
        .route("/api/stream/hls/{id}/{filename}", get(stream::get_segment))
        .route("/api/stream/{id}", delete(stream::stop_stream))
        .route("/api/stream/sessions", get(stream::list_streams))
        .route("/api/stream/{id}/health", get(stream::stream_health))
        .route("/api/stream/{id}/log", get(stream::stream_log))
        .route("/api/stream/status", get(stream::stream_status))
        // Source diagnostics
        .route("/api/stream/probe", post(stream::probe_stream))
        .route("/api/stream/test", post(stream::test_stream))
        // Overlay storage
        .route("/api/overlays", post(overlays::create_overlay))
        .route("/api/overlays", get(overlays::get_overlays))
        .route("/api/overlays/{id}", get(overlays::get_overlay))
        .route("/api/overlays/{id}", axum::routing::put(overlays::update_overlay))
        .route("/api/overlays/{id}", delete(overlays::delete_overlay))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the HTTP server and serves until the listener fails.
pub async fn run_server(config: RivuletConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.server.port;
    let transcoder = FfmpegTranscoder::new(config.streaming.ffmpeg_path.clone());
    let manager = Arc::new(StreamManager::new(config.streaming, Arc::new(transcoder)));
    if !manager.transcoder_available() {
        warn!("ffmpeg not found on PATH; RTSP sources will fall back to the demo stream");
    }

    let state = AppState::new(manager, Arc::new(MemoryOverlayStore::new()));
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("Rivulet API listening on http://0.0.0.0:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}
