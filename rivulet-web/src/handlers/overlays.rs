//! CRUD handlers for overlay documents.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use crate::server::AppState;

fn not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Overlay not found" })),
    )
        .into_response()
}

/// `POST /api/overlays`
pub async fn create_overlay(
    State(state): State<AppState>,
    Json(document): Json<Value>,
) -> impl IntoResponse {
    let id = state.overlays.create(document).await;
    (StatusCode::CREATED, Json(json!({ "id": id })))
}

/// `GET /api/overlays`
pub async fn get_overlays(State(state): State<AppState>) -> Json<Vec<Value>> {
    Json(state.overlays.list().await)
}

/// `GET /api/overlays/{id}`
pub async fn get_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    match state.overlays.fetch(&id).await {
        Some(document) => Json(document).into_response(),
        None => not_found(),
    }
}

/// `PUT /api/overlays/{id}`
pub async fn update_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(changes): Json<Value>,
) -> axum::response::Response {
    if state.overlays.update(&id, changes).await {
        Json(json!({ "message": "Updated successfully" })).into_response()
    } else {
        not_found()
    }
}

/// `DELETE /api/overlays/{id}`
pub async fn delete_overlay(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if state.overlays.delete(&id).await {
        Json(json!({ "message": "Deleted successfully" })).into_response()
    } else {
        not_found()
    }
}
