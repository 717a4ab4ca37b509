//! Stream lifecycle and diagnostics handlers.

use axum::Json;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Response, StatusCode};
use axum::response::IntoResponse;
use rivulet_core::streaming::{
    Credentials, ProbeReport, SourceTest, StartOutcome, StartRequest, StreamError, Transport,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::ApiError;
use crate::server::AppState;

/// Body of `POST /api/stream/convert`.
#[derive(Debug, Deserialize)]
pub struct ConvertRequest {
    pub rtsp_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub transport: Option<String>,
}

/// Body of `POST /api/stream/probe`.
#[derive(Debug, Deserialize)]
pub struct ProbeRequest {
    pub rtsp_url: Option<String>,
    pub transport: Option<String>,
}

/// Body of `POST /api/stream/test`.
#[derive(Debug, Deserialize)]
pub struct TestRequest {
    pub rtsp_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub transport: Option<String>,
}

fn bad_request(message: &str) -> axum::response::Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn parse_transport(raw: Option<&str>) -> Result<Transport, axum::response::Response> {
    match raw {
        None => Ok(Transport::default()),
        Some(value) => value.parse().map_err(|reason: String| bad_request(&reason)),
    }
}

fn credentials_from(username: Option<String>, password: Option<String>) -> Option<Credentials> {
    match (username, password) {
        (Some(username), Some(password)) if !username.is_empty() => Some(Credentials {
            username,
            password,
        }),
        _ => None,
    }
}

fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// `POST /api/stream/convert` - start an RTSP-to-HLS session.
///
/// Non-RTSP URLs pass through untouched; a failed launch falls back to
/// the demo stream so the player always has something to show.
pub async fn convert_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ConvertRequest>,
) -> Result<axum::response::Response, ApiError> {
    let Some(source) = request.rtsp_url.filter(|url| !url.is_empty()) else {
        return Ok(bad_request("RTSP URL required"));
    };
    let transport = match parse_transport(request.transport.as_deref()) {
        Ok(transport) => transport,
        Err(response) => return Ok(response),
    };

    let start = StartRequest {
        source,
        credentials: credentials_from(request.username, request.password),
        transport,
        user_agent: user_agent(&headers),
    };

    match state.streams.start_session(start).await {
        Ok(StartOutcome::Converted {
            session_id,
            playlist_url,
        }) => {
            info!("conversion started: session {session_id}");
            Ok(Json(json!({
                "message": "RTSP conversion started",
                "stream_url": playlist_url,
                "type": "hls",
                "session_id": session_id,
            }))
            .into_response())
        }
        Ok(StartOutcome::Direct { url }) => Ok(Json(json!({
            "message": "Direct URL",
            "stream_url": url,
            "type": "direct",
        }))
        .into_response()),
        Err(StreamError::LaunchFailed { reason }) => {
            warn!("transcoder launch failed, serving fallback: {reason}");
            Ok(Json(json!({
                "message": "RTSP conversion unavailable",
                "stream_url": state.streams.fallback_stream_url(),
                "type": "fallback",
                "note": "Using fallback video. Install FFmpeg for RTSP support.",
            }))
            .into_response())
        }
        Err(err) => Err(err.into()),
    }
}

/// `GET /api/stream/hls/{id}/{filename}` - serve a playlist or segment.
pub async fn get_segment(
    State(state): State<AppState>,
    Path((id, filename)): Path<(String, String)>,
) -> Result<Response<Body>, ApiError> {
    let segment = state.streams.serve_segment(&id, &filename).await?;
    let response = Response::builder()
        .status(StatusCode::OK)
        .header("content-type", segment.content_type)
        .header("cache-control", segment.cache_control)
        .body(Body::from(segment.bytes))
        .map_err(|e| StreamError::Io {
            operation: "build segment response".to_string(),
            source: std::io::Error::other(e),
        })?;
    Ok(response)
}

/// `DELETE /api/stream/{id}` - stop a session and release its resources.
pub async fn stop_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.streams.stop_session(&id).await?;
    info!("session stopped: {id}");
    Ok(Json(json!({ "message": "Stream stopped" })))
}

/// `GET /api/stream/sessions` - summaries of all registered sessions.
pub async fn list_streams(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sessions = state.streams.list_sessions().await;
    Json(json!({ "sessions": sessions }))
}

/// `GET /api/stream/{id}/health` - detailed health of one session.
pub async fn stream_health(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let health = state.streams.session_health(&id).await?;
    Ok(Json(json!(health)))
}

/// `GET /api/stream/{id}/log` - recent transcoder diagnostics.
pub async fn stream_log(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let log = state.streams.session_log(&id).await?;
    Ok(Json(json!({ "log": log })))
}

/// `GET /api/stream/status` - capability report for the streaming stack.
pub async fn stream_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let available = state.streams.transcoder_available();
    Json(json!({
        "transcoder_available": available,
        "rtsp_support": available,
        "supported_formats": ["HLS"],
        "active_sessions": state.streams.list_sessions().await.len(),
    }))
}

/// `POST /api/stream/probe` - raw reachability probe.
pub async fn probe_stream(
    State(state): State<AppState>,
    Json(request): Json<ProbeRequest>,
) -> Result<axum::response::Response, ApiError> {
    let Some(source) = request.rtsp_url.filter(|url| !url.is_empty()) else {
        return Ok(bad_request("RTSP URL required"));
    };
    let transport = match parse_transport(request.transport.as_deref()) {
        Ok(transport) => transport,
        Err(response) => return Ok(response),
    };
    let report: ProbeReport = state.streams.probe_source(&source, transport).await?;
    Ok(Json(json!(report)).into_response())
}

/// `POST /api/stream/test` - reachability test with failure guidance.
pub async fn test_stream(
    State(state): State<AppState>,
    Json(request): Json<TestRequest>,
) -> Result<axum::response::Response, ApiError> {
    let Some(source) = request.rtsp_url.filter(|url| !url.is_empty()) else {
        return Ok(bad_request("RTSP URL required"));
    };
    let transport = match parse_transport(request.transport.as_deref()) {
        Ok(transport) => transport,
        Err(response) => return Ok(response),
    };
    let credentials = credentials_from(request.username, request.password);
    let result: SourceTest = state
        .streams
        .test_source(&source, credentials.as_ref(), transport)
        .await?;
    Ok(Json(json!(result)).into_response())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::to_bytes;
    use rivulet_core::config::StreamingConfig;
    use rivulet_core::overlay::MemoryOverlayStore;
    use rivulet_core::streaming::{ScriptedTranscoder, StreamManager};
    use tempfile::tempdir;

    use super::*;

    fn state_with(transcoder: ScriptedTranscoder, root: &std::path::Path) -> AppState {
        let config = StreamingConfig::for_testing(root.to_path_buf());
        let manager = Arc::new(StreamManager::new(config, Arc::new(transcoder)));
        AppState::new(manager, Arc::new(MemoryOverlayStore::new()))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn convert_passes_non_rtsp_url_through() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let request = ConvertRequest {
            rtsp_url: Some("https://example.com/video.mp4".to_string()),
            username: None,
            password: None,
            transport: None,
        };
        let response = convert_stream(State(state), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["type"], "direct");
        assert_eq!(body["stream_url"], "https://example.com/video.mp4");
    }

    #[tokio::test]
    async fn convert_starts_hls_session_for_rtsp_url() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let request = ConvertRequest {
            rtsp_url: Some("rtsp://camera.local/stream1".to_string()),
            username: None,
            password: None,
            transport: None,
        };
        let response = convert_stream(State(state.clone()), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["type"], "hls");
        let session_id = body["session_id"].as_str().unwrap();
        assert!(
            body["stream_url"]
                .as_str()
                .unwrap()
                .ends_with(&format!("{session_id}/playlist.m3u8"))
        );
        assert!(state.streams.registry().contains(session_id).await);
    }

    #[tokio::test]
    async fn convert_falls_back_when_launch_fails() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy().launch_failure(), dir.path());
        let request = ConvertRequest {
            rtsp_url: Some("rtsp://camera.local/stream1".to_string()),
            username: None,
            password: None,
            transport: None,
        };
        let response = convert_stream(State(state), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["type"], "fallback");
        assert!(body["stream_url"].as_str().unwrap().contains("BigBuckBunny"));
    }

    #[tokio::test]
    async fn convert_rejects_missing_url() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let request = ConvertRequest {
            rtsp_url: None,
            username: None,
            password: None,
            transport: None,
        };
        let response = convert_stream(State(state), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn convert_rejects_unknown_transport() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let request = ConvertRequest {
            rtsp_url: Some("rtsp://camera.local/stream1".to_string()),
            username: None,
            password: None,
            transport: Some("carrier-pigeon".to_string()),
        };
        let response = convert_stream(State(state), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn segment_request_for_unknown_session_is_404() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let result = get_segment(
            State(state),
            Path(("nope".to_string(), "playlist.m3u8".to_string())),
        )
        .await;
        let response = result.err().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn segment_response_carries_media_headers_only() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let request = ConvertRequest {
            rtsp_url: Some("rtsp://camera.local/stream1".to_string()),
            username: None,
            password: None,
            transport: None,
        };
        let response = convert_stream(State(state.clone()), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        let body = body_json(response).await;
        let id = body["session_id"].as_str().unwrap().to_string();

        // The playlist appears shortly after launch
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(2);
        let playlist = loop {
            match get_segment(
                State(state.clone()),
                Path((id.clone(), "playlist.m3u8".to_string())),
            )
            .await
            {
                Ok(response) => break response,
                Err(_) if std::time::Instant::now() < deadline => {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                Err(err) => panic!("playlist never served: {err:?}"),
            }
        };

        assert_eq!(playlist.status(), StatusCode::OK);
        assert_eq!(
            playlist.headers().get("content-type").unwrap(),
            "application/vnd.apple.mpegurl"
        );
        // Whole files only; ranges are neither honored nor advertised
        assert!(playlist.headers().get("accept-ranges").is_none());
    }

    #[tokio::test]
    async fn stop_then_stop_again_returns_404() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let request = ConvertRequest {
            rtsp_url: Some("rtsp://camera.local/stream1".to_string()),
            username: None,
            password: None,
            transport: None,
        };
        let response = convert_stream(State(state.clone()), HeaderMap::new(), Json(request))
            .await
            .unwrap();
        let body = body_json(response).await;
        let id = body["session_id"].as_str().unwrap().to_string();

        let Json(stopped) = stop_stream(State(state.clone()), Path(id.clone()))
            .await
            .unwrap();
        assert_eq!(stopped["message"], "Stream stopped");
        let second = stop_stream(State(state), Path(id)).await;
        let response = second.err().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn status_reports_active_session_count() {
        let dir = tempdir().unwrap();
        let state = state_with(ScriptedTranscoder::healthy(), dir.path());
        let request = ConvertRequest {
            rtsp_url: Some("rtsp://camera.local/stream1".to_string()),
            username: None,
            password: None,
            transport: None,
        };
        convert_stream(State(state.clone()), HeaderMap::new(), Json(request))
            .await
            .unwrap();

        let Json(status) = stream_status(State(state)).await;
        assert_eq!(status["active_sessions"], 1);
        assert_eq!(status["supported_formats"], json!(["HLS"]));
    }
}
