//! Service health and API documentation handlers.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::server::AppState;

/// `GET /` - liveness check with basic service facts.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "Rivulet backend running",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.server_started_at.elapsed().as_secs(),
    }))
}

/// `GET /api/docs` - machine-readable endpoint listing.
pub async fn api_docs() -> Json<Value> {
    Json(json!({
        "service": "rivulet",
        "endpoints": {
            "GET /": "Health check",
            "GET /api/docs": "This listing",
            "POST /api/stream/convert": "Start an RTSP-to-HLS session",
            "GET /api/stream/hls/{id}/{filename}": "Fetch an HLS playlist or segment",
            "DELETE /api/stream/{id}": "Stop a session",
            "GET /api/stream/sessions": "List active sessions",
            "GET /api/stream/{id}/health": "Detailed session health",
            "GET /api/stream/{id}/log": "Recent transcoder diagnostics",
            "GET /api/stream/status": "Streaming capability report",
            "POST /api/stream/probe": "Raw source reachability probe",
            "POST /api/stream/test": "Source test with failure guidance",
            "POST /api/overlays": "Create an overlay document",
            "GET /api/overlays": "List overlay documents",
            "GET /api/overlays/{id}": "Fetch an overlay document",
            "PUT /api/overlays/{id}": "Update an overlay document",
            "DELETE /api/overlays/{id}": "Delete an overlay document",
        },
    }))
}
