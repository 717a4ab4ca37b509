//! Boundary operations of the stream session lifecycle manager.

use std::sync::Arc;

use serde::Serialize;

use crate::config::StreamingConfig;

use super::cleanup::CleanupCoordinator;
use super::diagnostics::{self, ProbeReport, SourceTest};
use super::monitor::LifecycleMonitor;
use super::process::{LaunchSpec, Transcoder};
use super::registry::{SessionRegistry, SessionSummary};
use super::segments::{self, SegmentData};
use super::session::{Credentials, Session, SessionStatus, Transport, scrub_credentials};
use super::{MANIFEST_NAME, StreamError, StreamResult};

/// Everything a caller provides to start a session.
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub source: String,
    pub credentials: Option<Credentials>,
    pub transport: Transport,
    pub user_agent: Option<String>,
}

/// Outcome of a start request.
#[derive(Debug, Clone)]
pub enum StartOutcome {
    /// A session was registered; the stream will be playable at the URL
    /// once the session reaches `streaming`.
    Converted {
        session_id: String,
        playlist_url: String,
    },
    /// Non-RTSP sources are already HTTP-playable, so they pass through
    /// untouched with no session created.
    Direct { url: String },
}

/// Detailed health of a single session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionHealth {
    pub status: SessionStatus,
    pub running: bool,
    pub manifest_exists: bool,
    pub manifest_size: u64,
    pub segment_count: usize,
    pub ready: bool,
    pub uptime_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

/// Facade over the streaming subsystem: supervisor, registry, monitor,
/// segment server, cleanup and diagnostics behind one injectable seam.
pub struct StreamManager {
    registry: SessionRegistry,
    transcoder: Arc<dyn Transcoder>,
    cleanup: CleanupCoordinator,
    config: StreamingConfig,
}

impl StreamManager {
    pub fn new(config: StreamingConfig, transcoder: Arc<dyn Transcoder>) -> Self {
        let registry = SessionRegistry::new();
        let cleanup = CleanupCoordinator::new(registry.clone(), config.clone());
        Self {
            registry,
            transcoder,
            cleanup,
            config,
        }
    }

    pub fn config(&self) -> &StreamingConfig {
        &self.config
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Whether the transcoder binary is installed and runnable.
    pub fn transcoder_available(&self) -> bool {
        self.transcoder.is_available()
    }

    /// Static substitute stream for callers whose conversion cannot start.
    pub fn fallback_stream_url(&self) -> &str {
        &self.config.fallback_stream_url
    }

    /// Starts a transcoding session for an RTSP source.
    ///
    /// Registers the session in `starting` state and spawns its lifecycle
    /// monitor before returning; readiness is observed asynchronously
    /// through [`StreamManager::session_health`] or by polling the manifest.
    ///
    /// # Errors
    /// - `StreamError::TooManySessions` - concurrent session cap reached
    /// - `StreamError::DirectoryCreation` - working directory not creatable
    /// - `StreamError::LaunchFailed` - process spawn failed; nothing was
    ///   registered and the partial directory was removed
    pub async fn start_session(&self, request: StartRequest) -> StreamResult<StartOutcome> {
        if !request.source.starts_with("rtsp://") {
            tracing::info!(
                "non-RTSP source passed through: {}",
                scrub_credentials(&request.source)
            );
            return Ok(StartOutcome::Direct {
                url: request.source,
            });
        }

        // Fast-path rejection; the authoritative gate is the atomic
        // check-and-insert at registration below.
        if self.registry.len().await >= self.config.max_concurrent_sessions {
            return Err(StreamError::TooManySessions {
                limit: self.config.max_concurrent_sessions,
            });
        }

        let id = uuid::Uuid::new_v4().to_string();
        let dir = self.config.hls_root.join(&id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StreamError::DirectoryCreation {
                path: dir.clone(),
                source: e,
            })?;

        let base_url = format!(
            "{}/{id}/",
            self.config.public_base_url.trim_end_matches('/')
        );
        let spec = LaunchSpec {
            source: request.source.clone(),
            credentials: request.credentials,
            transport: request.transport,
            user_agent: request.user_agent,
            dir: dir.clone(),
            base_url: base_url.clone(),
        };

        let process = match self.transcoder.launch(&spec, &self.config).await {
            Ok(process) => process,
            Err(e) => {
                // Pair creation with deletion even on the failure path
                let _ = tokio::fs::remove_dir_all(&dir).await;
                return Err(e);
            }
        };

        let session = Session::new(
            id.clone(),
            request.source,
            request.transport,
            dir,
            process,
            self.config.log_capacity,
        );
        let redacted = session.redacted_source();
        if let Err(mut session) = self
            .registry
            .insert_if_below(session, self.config.max_concurrent_sessions)
            .await
        {
            // Lost the race for the last slot
            session.process.terminate(self.config.stop_grace).await;
            let _ = tokio::fs::remove_dir_all(&session.dir).await;
            return Err(StreamError::TooManySessions {
                limit: self.config.max_concurrent_sessions,
            });
        }

        LifecycleMonitor::new(
            self.registry.clone(),
            self.cleanup.clone(),
            self.config.clone(),
        )
        .spawn(id.clone());

        tracing::info!("session {id} registered for {redacted}");

        Ok(StartOutcome::Converted {
            playlist_url: format!("{base_url}{MANIFEST_NAME}"),
            session_id: id,
        })
    }

    /// Serves one manifest or segment file for a session.
    pub async fn serve_segment(&self, id: &str, filename: &str) -> StreamResult<SegmentData> {
        segments::serve_segment(&self.registry, id, filename).await
    }

    /// Client-initiated stop; same finalization path as monitor-detected
    /// termination and safe to race against it.
    ///
    /// # Errors
    /// - `StreamError::SessionNotFound` - already stopped or never existed
    pub async fn stop_session(&self, id: &str) -> StreamResult<()> {
        if self.cleanup.finalize(id).await {
            Ok(())
        } else {
            Err(StreamError::SessionNotFound { id: id.to_string() })
        }
    }

    /// Summaries of all registered sessions.
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        self.registry.snapshot().await
    }

    /// Detailed health of one session.
    ///
    /// # Errors
    /// - `StreamError::SessionNotFound` - unknown session id
    pub async fn session_health(&self, id: &str) -> StreamResult<SessionHealth> {
        let observed = self
            .registry
            .with_session_mut(id, |session| {
                let running = matches!(session.process.try_wait(), Ok(None));
                (
                    session.dir.clone(),
                    session.status,
                    running,
                    session.uptime().as_secs(),
                    session.error_detail.clone(),
                )
            })
            .await;

        let Some((dir, status, running, uptime_secs, error_detail)) = observed else {
            return Err(StreamError::SessionNotFound { id: id.to_string() });
        };

        let manifest_size = tokio::fs::metadata(dir.join(MANIFEST_NAME))
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        let manifest_exists = manifest_size > 0;

        let mut segment_count = 0;
        if let Ok(mut entries) = tokio::fs::read_dir(&dir).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                if entry.file_name().to_string_lossy().ends_with(".ts") {
                    segment_count += 1;
                }
            }
        }

        Ok(SessionHealth {
            status,
            running,
            manifest_exists,
            manifest_size,
            segment_count,
            ready: manifest_exists
                && matches!(status, SessionStatus::Ready | SessionStatus::Streaming),
            uptime_secs,
            error_detail,
        })
    }

    /// Bounded diagnostic log captured from the session's process.
    ///
    /// # Errors
    /// - `StreamError::SessionNotFound` - unknown session id
    pub async fn session_log(&self, id: &str) -> StreamResult<Vec<String>> {
        self.registry
            .with_session_mut(id, |session| {
                session.capture_diagnostics();
                session.log.snapshot()
            })
            .await
            .ok_or_else(|| StreamError::SessionNotFound { id: id.to_string() })
    }

    /// Raw reachability probe against a candidate source.
    pub async fn probe_source(
        &self,
        source: &str,
        transport: Transport,
    ) -> StreamResult<ProbeReport> {
        diagnostics::probe_source(self.transcoder.as_ref(), source, transport, &self.config).await
    }

    /// Reachability test with failure classification and guidance.
    pub async fn test_source(
        &self,
        source: &str,
        credentials: Option<&Credentials>,
        transport: Transport,
    ) -> StreamResult<SourceTest> {
        diagnostics::test_source(
            self.transcoder.as_ref(),
            source,
            credentials,
            transport,
            &self.config,
        )
        .await
    }
}
