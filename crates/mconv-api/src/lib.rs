//! Axum HTTP API for media conversion.
//!
//! This crate provides:
//! - Multipart upload endpoints for video transcoding and audio extraction
//! - Health and readiness probes
//! - Request IDs, request logging and security headers
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
