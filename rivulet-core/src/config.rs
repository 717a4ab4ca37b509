//! Centralized configuration for Rivulet.
//!
//! All tunable parameters live here so the lifecycle monitor, cleanup
//! coordinator and diagnostics never carry hard-coded intervals. Tests
//! inject shortened timings through [`RivuletConfig::for_testing`].

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all Rivulet components.
///
/// Groups related settings into logical sections and supports environment
/// variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct RivuletConfig {
    pub streaming: StreamingConfig,
    pub server: ServerConfig,
}

/// Stream session lifecycle configuration.
///
/// Controls the FFmpeg invocation, the readiness state machine timings and
/// the cleanup grace periods.
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Path to the FFmpeg binary.
    pub ffmpeg_path: PathBuf,
    /// Root directory holding one working directory per session.
    pub hls_root: PathBuf,
    /// URL prefix under which the segment server is reachable.
    pub public_base_url: String,
    /// Target duration of one HLS segment.
    pub segment_duration: Duration,
    /// Number of segments kept in the rolling playlist window.
    pub playlist_window: usize,
    /// Constant output frame rate.
    pub frame_rate: u32,
    /// Keyframe interval in frames (fixed so segment duration is predictable).
    pub keyframe_interval: u32,
    /// Target video bitrate in kbit/s.
    pub video_bitrate_kbps: u32,
    /// Socket I/O timeout passed to the RTSP input.
    pub connect_timeout: Duration,
    /// Input analysis duration limit in microseconds.
    pub analyze_duration_us: u64,
    /// Input probe size limit in bytes.
    pub probe_size_bytes: u64,
    /// Wait before the first liveness check, absorbs process-spawn latency.
    pub spawn_grace: Duration,
    /// Poll interval while waiting for the manifest to appear.
    pub poll_interval: Duration,
    /// Coarser liveness poll interval once the session is streaming.
    pub liveness_interval: Duration,
    /// Maximum time between process start and first non-empty manifest.
    pub readiness_timeout: Duration,
    /// Grace period between graceful stop and forced kill.
    pub stop_grace: Duration,
    /// Delay before a finalized session's working directory is deleted,
    /// long enough for a client mid-read to fetch its last segments.
    pub delete_delay: Duration,
    /// Maximum number of captured diagnostic lines per session.
    pub log_capacity: usize,
    /// Maximum length of the error detail stored on a failed session.
    pub error_detail_max: usize,
    /// Timeout for one-shot source probes, separate from session readiness.
    pub probe_timeout: Duration,
    /// Maximum concurrent sessions; new requests beyond this are rejected.
    pub max_concurrent_sessions: usize,
    /// Static substitute stream returned when the transcoder cannot start.
    pub fallback_stream_url: String,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            hls_root: std::env::temp_dir().join("rivulet-hls"),
            public_base_url: "/api/stream/hls".to_string(),
            segment_duration: Duration::from_secs(2),
            playlist_window: 10,
            frame_rate: 25,
            keyframe_interval: 50, // 2 seconds at 25 fps
            video_bitrate_kbps: 2000,
            connect_timeout: Duration::from_secs(10),
            analyze_duration_us: 5_000_000,
            probe_size_bytes: 5_000_000,
            spawn_grace: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
            liveness_interval: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(30),
            stop_grace: Duration::from_secs(3),
            delete_delay: Duration::from_secs(60),
            log_capacity: 200,
            error_detail_max: 500,
            probe_timeout: Duration::from_secs(10),
            max_concurrent_sessions: 16,
            fallback_stream_url:
                "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/BigBuckBunny.mp4"
                    .to_string(),
        }
    }
}

impl StreamingConfig {
    /// Shortened timings for deterministic tests with scripted processes.
    pub fn for_testing(hls_root: PathBuf) -> Self {
        Self {
            hls_root,
            spawn_grace: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
            liveness_interval: Duration::from_millis(20),
            readiness_timeout: Duration::from_millis(500),
            stop_grace: Duration::from_millis(50),
            delete_delay: Duration::from_millis(50),
            probe_timeout: Duration::from_millis(200),
            ..Default::default()
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the API server to.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: 5000 }
    }
}

impl RivuletConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("RIVULET_FFMPEG_PATH") {
            config.streaming.ffmpeg_path = PathBuf::from(path);
        }

        if let Ok(root) = std::env::var("RIVULET_HLS_ROOT") {
            config.streaming.hls_root = PathBuf::from(root);
        }

        if let Ok(timeout) = std::env::var("RIVULET_READINESS_TIMEOUT") {
            if let Ok(seconds) = timeout.parse::<u64>() {
                config.streaming.readiness_timeout = Duration::from_secs(seconds);
            }
        }

        if let Ok(max) = std::env::var("RIVULET_MAX_SESSIONS") {
            if let Ok(count) = max.parse::<usize>() {
                config.streaming.max_concurrent_sessions = count;
            }
        }

        if let Ok(port) = std::env::var("RIVULET_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                config.server.port = port;
            }
        }

        config
    }
}
