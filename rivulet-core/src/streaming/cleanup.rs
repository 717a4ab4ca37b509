//! Idempotent session finalization.

use crate::config::StreamingConfig;

use super::registry::SessionRegistry;
use super::session::SessionStatus;

/// Finalizes sessions: stops the process, removes the registry entry and
/// schedules delayed deletion of the working directory.
///
/// Safe to invoke twice for the same session; an explicit stop request may
/// race monitor-detected termination, and whoever loses the race finds the
/// registry entry already gone and no-ops.
#[derive(Clone)]
pub struct CleanupCoordinator {
    registry: SessionRegistry,
    config: StreamingConfig,
}

impl CleanupCoordinator {
    pub fn new(registry: SessionRegistry, config: StreamingConfig) -> Self {
        Self { registry, config }
    }

    /// Tears a session down; returns `false` when it was already finalized.
    ///
    /// The registry removal happens first, so no new requests see the
    /// session as live while its process is being stopped. Directory
    /// deletion is deferred by a grace delay long enough for a client
    /// mid-read to fetch the last served segments, and runs independently
    /// of the registry removal. Removal is also the idempotency gate: the
    /// deletion task can never be scheduled twice for one session.
    pub async fn finalize(&self, id: &str) -> bool {
        let Some(mut session) = self.registry.remove(id).await else {
            tracing::debug!("cleanup for {id}: session already finalized");
            return false;
        };

        session.capture_diagnostics();
        if !session.status.is_terminal() {
            session.advance(SessionStatus::Stopped);
        }

        session.process.terminate(self.config.stop_grace).await;

        let dir = session.dir.clone();
        let delay = self.config.delete_delay;
        let session_id = session.id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => tracing::debug!("deleted working directory for {session_id}"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "failed to delete working directory {}: {e}",
                    dir.display()
                ),
            }
        });

        tracing::info!(
            "finalized session {} (status {}, uptime {}s)",
            session.id,
            session.status,
            session.uptime().as_secs()
        );
        true
    }
}
