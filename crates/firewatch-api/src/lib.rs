//! Axum HTTP server for the fire and smoke detection service.
//!
//! This crate provides:
//! - Webcam session control and the realtime MJPEG stream
//! - Video upload, VOD streaming, downloads and past-video replay
//! - Fire-log and video-log retrieval
//! - Rate limiting, security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod responses;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, ModelConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::{AppState, Collaborators};
