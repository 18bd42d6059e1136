//! HTTP front end for the fetchgate pipelines.
pub mod api;
pub mod config;
pub mod logging;

pub use api::{create_router, serve, AppState};
pub use config::{ConfigError, RateLimitConfig, ServerConfig};
