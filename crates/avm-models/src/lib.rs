//! Shared data models for the narrated video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job records and their lifecycle
//! - Video modes and the per-mode stage plans
//! - Scripts, content descriptors and submission requests
//! - Sanitized error categories
//! - Playback encoding profile

pub mod content;
pub mod encoding;
pub mod error_category;
pub mod job;
pub mod request;
pub mod script;
pub mod stage;

// Re-export common types
pub use content::{ContentDescriptor, ContentKind};
pub use encoding::PlaybackProfile;
pub use error_category::ErrorCategory;
pub use job::{Job, JobId, JobStatus, JobTransitionError};
pub use request::{AvatarProvider, JobRequest, Persona, RequestError, ScrollSpeed, VideoStyle};
pub use script::{Script, ScriptSection};
pub use stage::{PipelineStage, VideoMode};
