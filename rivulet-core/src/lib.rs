//! Core stream session lifecycle management for Rivulet.
//!
//! Rivulet turns live RTSP sources into HTTP-playable HLS streams by
//! supervising one external FFmpeg process per requested source. This crate
//! contains the session registry, the lifecycle monitor state machine,
//! segment serving, cleanup coordination and source diagnostics, plus the
//! overlay metadata store the web layer exposes alongside the streams.

pub mod config;
pub mod overlay;
pub mod streaming;
pub mod tracing_setup;

pub use config::{RivuletConfig, ServerConfig, StreamingConfig};
