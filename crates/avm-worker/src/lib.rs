//! Narrated video pipeline orchestrator.
//!
//! This crate provides:
//! - Contracts for the analysis, script, speech and capture services,
//!   plus an HTTP client implementing them
//! - The per-mode stage state machine that drives a job to completion
//! - Error classification into sanitized categories
//! - `JobService` for submitting jobs and reading their state

pub mod classify;
pub mod collaborators;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod service;

pub use classify::classify;
pub use collaborators::{
    CollaboratorConfig, CollaboratorError, CollaboratorErrorKind, CollaboratorResult,
    Collaborators, ContentAnalyzer, NarrationSynthesizer, ScreenCapture, ScriptGenerator,
    ServiceClient,
};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::Pipeline;
pub use service::JobService;
