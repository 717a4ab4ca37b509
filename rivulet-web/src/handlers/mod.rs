//! Request handlers for the Rivulet HTTP API.

pub mod error;
pub mod overlays;
pub mod stream;
pub mod system;

pub use error::ApiError;
