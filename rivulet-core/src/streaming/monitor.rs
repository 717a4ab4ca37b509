//! Per-session lifecycle monitor.
//!
//! Readiness cannot be observed as a single synchronous call: the transcoder
//! is a black box whose startup latency depends on network conditions to the
//! source. The monitor therefore polls process liveness and the output
//! directory under a bounded timeout, and drives the session status machine
//! `starting -> ready -> streaming` with `error` reachable from any state.

use std::time::Instant;

use tokio::task::JoinHandle;

use crate::config::StreamingConfig;

use super::cleanup::CleanupCoordinator;
use super::registry::SessionRegistry;
use super::session::SessionStatus;
use super::MANIFEST_NAME;

/// What the liveness checkpoint observed.
enum Liveness {
    Running,
    Exited { code: i32 },
    Gone,
}

/// One background monitoring task per session.
pub struct LifecycleMonitor {
    registry: SessionRegistry,
    cleanup: CleanupCoordinator,
    config: StreamingConfig,
}

impl LifecycleMonitor {
    pub fn new(
        registry: SessionRegistry,
        cleanup: CleanupCoordinator,
        config: StreamingConfig,
    ) -> Self {
        Self {
            registry,
            cleanup,
            config,
        }
    }

    /// Spawns the monitoring task for a registered session.
    pub fn spawn(self, id: String) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run(&id).await;
        })
    }

    async fn run(&self, id: &str) {
        // Grace period absorbs process-spawn latency and avoids false
        // fast-fails on slow hosts.
        tokio::time::sleep(self.config.spawn_grace).await;

        let Some(manifest_path) = self
            .registry
            .with_session(id, |session| session.dir.join(MANIFEST_NAME))
            .await
        else {
            return; // stopped before the monitor got going
        };

        // Fast-fail path for immediately-invalid sources
        match self.check_liveness(id).await {
            Liveness::Running => {}
            Liveness::Exited { code } => {
                self.fail(id, &format!("transcoder exited during startup (code {code})"))
                    .await;
                return;
            }
            Liveness::Gone => return,
        }

        let deadline = Instant::now() + self.config.readiness_timeout;
        loop {
            match self.check_liveness(id).await {
                Liveness::Running => {}
                Liveness::Exited { code } => {
                    self.fail(id, &format!("transcoder exited before producing a manifest (code {code})"))
                        .await;
                    return;
                }
                Liveness::Gone => return,
            }

            if manifest_ready(&manifest_path).await {
                let advanced = self
                    .registry
                    .with_session_mut(id, |session| {
                        // Ready is an observable waypoint, not a wait state
                        session.advance(SessionStatus::Ready)
                            && session.advance(SessionStatus::Streaming)
                    })
                    .await
                    .unwrap_or(false);
                if !advanced {
                    return;
                }
                tracing::info!("session {id} is streaming");
                break;
            }

            if Instant::now() >= deadline {
                self.fail(
                    id,
                    &format!(
                        "no manifest within readiness timeout ({}s)",
                        self.config.readiness_timeout.as_secs_f64()
                    ),
                )
                .await;
                return;
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }

        // Streaming: only coarse liveness polling is needed, segment
        // freshness is observed by live requests rather than the monitor.
        loop {
            tokio::time::sleep(self.config.liveness_interval).await;

            match self.check_liveness(id).await {
                Liveness::Running => {}
                Liveness::Exited { code: 0 } => {
                    tracing::info!("session {id}: transcoder finished, finalizing");
                    self.cleanup.finalize(id).await;
                    return;
                }
                Liveness::Exited { code } => {
                    tracing::info!(
                        "session {id}: transcoder exited with code {code} while streaming"
                    );
                    // Normal termination path; the source went away
                    self.cleanup.finalize(id).await;
                    return;
                }
                Liveness::Gone => return,
            }
        }
    }

    /// Checkpoint: drain diagnostics into the session log and test liveness.
    async fn check_liveness(&self, id: &str) -> Liveness {
        let observed = self
            .registry
            .with_session_mut(id, |session| {
                session.capture_diagnostics();
                session.process.try_wait()
            })
            .await;

        match observed {
            None => Liveness::Gone,
            Some(Ok(None)) => Liveness::Running,
            Some(Ok(Some(code))) => Liveness::Exited { code },
            Some(Err(e)) => {
                // Treat an unobservable process as a fatal monitoring error
                self.fail(id, &format!("failed to poll transcoder: {e}")).await;
                Liveness::Gone
            }
        }
    }

    /// Marks the session failed with its buffered diagnostics, then cleans up.
    async fn fail(&self, id: &str, detail: &str) {
        let detail_max = self.config.error_detail_max;
        let logged = self
            .registry
            .with_session_mut(id, |session| {
                session.capture_diagnostics();
                let context = session
                    .log
                    .snapshot()
                    .last()
                    .map(|line| format!("{detail}: {line}"))
                    .unwrap_or_else(|| detail.to_string());
                session.fail(&context, detail_max);
                session.error_detail.clone()
            })
            .await
            .flatten();

        if let Some(detail) = logged {
            tracing::warn!("session {id} failed: {detail}");
        }
        self.cleanup.finalize(id).await;
    }
}

/// The manifest counts once it exists with non-zero size; a zero-length
/// file is still being written by the transcoder.
async fn manifest_ready(path: &std::path::Path) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata.len() > 0,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_manifest_ready_gates_on_size() {
        let temp = tempdir().unwrap();
        let path = temp.path().join(MANIFEST_NAME);

        assert!(!manifest_ready(&path).await);

        std::fs::write(&path, b"").unwrap();
        assert!(!manifest_ready(&path).await);

        std::fs::write(&path, b"#EXTM3U\n").unwrap();
        assert!(manifest_ready(&path).await);
    }

    #[tokio::test]
    async fn test_manifest_ready_missing_directory() {
        assert!(!manifest_ready(Path::new("/nonexistent/rivulet/playlist.m3u8")).await);
    }
}
