//! End-to-end lifecycle tests against scripted transcoder processes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tempfile::tempdir;

use rivulet_core::config::StreamingConfig;
use rivulet_core::streaming::{
    MANIFEST_NAME, ScriptedTranscoder, SessionStatus, StartOutcome, StartRequest, StreamError,
    StreamManager, Transcoder, Transport,
};

fn rtsp_request(source: &str) -> StartRequest {
    StartRequest {
        source: source.to_string(),
        credentials: None,
        transport: Transport::Tcp,
        user_agent: None,
    }
}

async fn start(manager: &StreamManager, source: &str) -> String {
    match manager.start_session(rtsp_request(source)).await.unwrap() {
        StartOutcome::Converted { session_id, .. } => session_id,
        StartOutcome::Direct { .. } => panic!("expected a conversion for {source}"),
    }
}

/// Polls until the predicate holds or the deadline passes.
async fn wait_for<F, Fut>(what: &str, deadline: Duration, mut predicate: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let end = Instant::now() + deadline;
    loop {
        if predicate().await {
            return;
        }
        if Instant::now() >= end {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn reachable_source_reaches_streaming_and_serves_playlist() {
    let temp = tempdir().unwrap();
    let config = StreamingConfig::for_testing(temp.path().to_path_buf());
    let manager = Arc::new(StreamManager::new(
        config,
        Arc::new(ScriptedTranscoder::healthy()),
    ));

    let id = start(&manager, "rtsp://cam/1").await;

    let m = Arc::clone(&manager);
    let session_id = id.clone();
    wait_for("session to reach streaming", Duration::from_secs(2), move || {
        let m = Arc::clone(&m);
        let id = session_id.clone();
        async move {
            m.registry()
                .with_session(&id, |s| s.status == SessionStatus::Streaming)
                .await
                .unwrap_or(false)
        }
    })
    .await;

    let playlist = manager.serve_segment(&id, MANIFEST_NAME).await.unwrap();
    assert!(!playlist.bytes.is_empty());
    assert_eq!(playlist.content_type, "application/vnd.apple.mpegurl");
    assert!(playlist.cache_control.contains("no-cache"));

    let segment = manager.serve_segment(&id, "segment00000.ts").await.unwrap();
    assert_eq!(segment.content_type, "video/mp2t");

    let health = manager.session_health(&id).await.unwrap();
    assert!(health.ready);
    assert!(health.running);
    assert_eq!(health.status, SessionStatus::Streaming);
    assert!(health.segment_count >= 3);

    manager.stop_session(&id).await.unwrap();
}

#[tokio::test]
async fn session_never_observed_back_in_starting_after_ready() {
    let temp = tempdir().unwrap();
    let config = StreamingConfig::for_testing(temp.path().to_path_buf());
    let manager = Arc::new(StreamManager::new(
        config,
        Arc::new(ScriptedTranscoder::healthy()),
    ));

    let id = start(&manager, "rtsp://cam/1").await;

    let mut seen_past_starting = false;
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        let Some(status) = manager.registry().with_session(&id, |s| s.status).await else {
            break;
        };
        if seen_past_starting {
            assert_ne!(status, SessionStatus::Starting);
        }
        if matches!(status, SessionStatus::Ready | SessionStatus::Streaming) {
            seen_past_starting = true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(seen_past_starting, "session never left starting");

    let _ = manager.stop_session(&id).await;
}

#[tokio::test]
async fn early_exit_fast_fails_without_reaching_ready() {
    let temp = tempdir().unwrap();
    let config = StreamingConfig::for_testing(temp.path().to_path_buf());
    let transcoder = Arc::new(ScriptedTranscoder::exits_early(
        1,
        vec!["Connection to tcp://bad-host:554 failed: Connection refused".to_string()],
    ));
    let manager = Arc::new(StreamManager::new(
        config,
        Arc::clone(&transcoder) as Arc<dyn Transcoder>,
    ));

    let id = start(&manager, "rtsp://bad-host/x").await;

    // Health while registered never reports ready
    if let Ok(health) = manager.session_health(&id).await {
        assert!(!health.ready);
    }

    let m = Arc::clone(&manager);
    let session_id = id.clone();
    wait_for("failed session to be finalized", Duration::from_secs(2), move || {
        let m = Arc::clone(&m);
        let id = session_id.clone();
        async move { !m.registry().contains(&id).await }
    })
    .await;

    // The scripted process was terminated during cleanup
    assert!(transcoder.launched()[0].exited());
}

#[tokio::test]
async fn silent_source_times_out_and_process_is_terminated() {
    let temp = tempdir().unwrap();
    let config = StreamingConfig::for_testing(temp.path().to_path_buf());
    let readiness_timeout = config.readiness_timeout;
    let transcoder = Arc::new(ScriptedTranscoder::silent());
    let manager = Arc::new(StreamManager::new(
        config,
        Arc::clone(&transcoder) as Arc<dyn Transcoder>,
    ));

    let id = start(&manager, "rtsp://cam/never-ready").await;

    let m = Arc::clone(&manager);
    let session_id = id.clone();
    wait_for(
        "timed-out session to be finalized",
        readiness_timeout + Duration::from_secs(2),
        move || {
            let m = Arc::clone(&m);
            let id = session_id.clone();
            async move { !m.registry().contains(&id).await }
        },
    )
    .await;

    assert!(transcoder.launched()[0].terminated());
}

#[tokio::test]
async fn removed_session_returns_not_found_while_directory_lingers() {
    let temp = tempdir().unwrap();
    let config = StreamingConfig::for_testing(temp.path().to_path_buf());
    let manager = Arc::new(StreamManager::new(
        config.clone(),
        Arc::new(ScriptedTranscoder::healthy()),
    ));

    let id = start(&manager, "rtsp://cam/1").await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    manager.stop_session(&id).await.unwrap();

    // Directory still on disk awaiting delayed deletion, but the registry
    // is authoritative
    let dir = config.hls_root.join(&id);
    assert!(dir.exists());
    let result = manager.serve_segment(&id, MANIFEST_NAME).await;
    assert!(matches!(result, Err(StreamError::SessionNotFound { .. })));
}

#[tokio::test]
async fn stop_races_with_monitor_cleanup_safely() {
    let temp = tempdir().unwrap();
    let config = StreamingConfig::for_testing(temp.path().to_path_buf());
    let manager = Arc::new(StreamManager::new(
        config,
        Arc::new(ScriptedTranscoder::exits_early(1, vec![])),
    ));

    let id = start(&manager, "rtsp://cam/1").await;

    // Explicit stop while the monitor is concurrently fast-failing the
    // session; exactly one of the two finalizes, neither panics.
    let _ = manager.stop_session(&id).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!manager.registry().contains(&id).await);

    let second = manager.stop_session(&id).await;
    assert!(matches!(second, Err(StreamError::SessionNotFound { .. })));
}
