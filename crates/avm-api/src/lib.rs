//! Axum HTTP API for narrated video jobs.
//!
//! Submits jobs to the worker, reports their progress, and serves finished
//! deliverables with byte-range support.

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
