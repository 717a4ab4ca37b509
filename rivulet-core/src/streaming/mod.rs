//! Stream session lifecycle management.
//!
//! One session supervises one external FFmpeg process that converts a live
//! RTSP source into a rolling window of HLS segments on disk. The registry
//! is the single source of truth for session existence; a per-session
//! lifecycle monitor drives the readiness state machine by polling process
//! liveness and the output directory, and the cleanup coordinator tears the
//! session down without racing clients still reading trailing segments.

pub mod cleanup;
pub mod diagnostics;
pub mod manager;
pub mod monitor;
pub mod process;
pub mod registry;
pub mod segments;
pub mod session;

use std::path::PathBuf;

pub use cleanup::CleanupCoordinator;
pub use diagnostics::{FailureCategory, ProbeReport, SourceTest, probe_source, test_source};
pub use manager::{SessionHealth, StartOutcome, StartRequest, StreamManager};
pub use monitor::LifecycleMonitor;
pub use process::{
    FfmpegTranscoder, LaunchSpec, ProbeOutput, ScriptedTranscoder, TranscodeProcess, Transcoder,
};
pub use registry::{SessionRegistry, SessionSummary};
pub use segments::{SegmentData, serve_segment};
pub use session::{Credentials, Session, SessionStatus, Transport};

/// Name of the HLS manifest inside every session working directory.
///
/// The transcoder invocation and the segment server agree on this name;
/// readiness is declared once this file exists with non-zero size.
pub const MANIFEST_NAME: &str = "playlist.m3u8";

/// Filename template for numbered segment files.
pub const SEGMENT_TEMPLATE: &str = "segment%05d.ts";

/// Errors surfaced by the stream session lifecycle manager.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// Session working directory could not be created; no session exists.
    #[error("failed to create session directory {path}: {source}")]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Transcoder process could not be started; no session was registered.
    #[error("failed to launch transcoder: {reason}")]
    LaunchFailed { reason: String },

    /// No session with this identifier exists in the registry.
    #[error("session not found: {id}")]
    SessionNotFound { id: String },

    /// Manifest requested before the session produced it; retryable.
    #[error("stream not ready: {id}")]
    NotReady { id: String },

    /// Requested file does not exist (or has not been fully written yet).
    #[error("file not found: {name}")]
    FileNotFound { name: String },

    /// Concurrent session cap reached; the caller may retry later.
    #[error("session limit reached ({limit} active)")]
    TooManySessions { limit: usize },

    /// One-shot diagnostic probe could not be executed.
    #[error("probe failed: {reason}")]
    ProbeFailed { reason: String },

    /// I/O error during a specific operation.
    #[error("IO error during {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result alias for stream lifecycle operations.
pub type StreamResult<T> = Result<T, StreamError>;
