//! HTTP API layer for Rivulet.
//!
//! Thin axum surface over `rivulet-core`: JSON handlers for session
//! lifecycle, HLS segment delivery, source diagnostics, and overlay
//! storage. No streaming logic lives here.

pub mod handlers;
pub mod server;

pub use server::{AppState, build_router, run_server};
