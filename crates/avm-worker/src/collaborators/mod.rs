//! Contracts for the external services the pipeline drives.
//!
//! Content analysis, script writing, speech synthesis and screen capture
//! run outside this process. The pipeline only sees these traits; the
//! [`ServiceClient`] implements all of them over HTTP.

mod http;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use avm_avatar::AvatarRenderer;
use avm_models::{ContentDescriptor, Script, ScrollSpeed, VideoStyle};

pub use http::{CollaboratorConfig, ServiceClient};

pub type CollaboratorResult<T> = Result<T, CollaboratorError>;

/// Why a collaborator call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorErrorKind {
    /// Service unreachable or answering with a server error
    Unavailable,
    Timeout,
    RateLimited,
    Unauthorized,
    /// The service rejected the input it was given
    InvalidInput,
    /// Any other refusal
    Rejected,
    /// Bad response or local failure around the call
    Internal,
}

impl CollaboratorErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollaboratorErrorKind::Unavailable => "unavailable",
            CollaboratorErrorKind::Timeout => "timeout",
            CollaboratorErrorKind::RateLimited => "rate_limited",
            CollaboratorErrorKind::Unauthorized => "unauthorized",
            CollaboratorErrorKind::InvalidInput => "invalid_input",
            CollaboratorErrorKind::Rejected => "rejected",
            CollaboratorErrorKind::Internal => "internal",
        }
    }

    /// Whether the failure means the remote service is unusable right now.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            CollaboratorErrorKind::Unavailable
                | CollaboratorErrorKind::Timeout
                | CollaboratorErrorKind::RateLimited
                | CollaboratorErrorKind::Unauthorized
        )
    }
}

impl fmt::Display for CollaboratorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct CollaboratorError {
    pub kind: CollaboratorErrorKind,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(kind: CollaboratorErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Unavailable, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::InvalidInput, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(CollaboratorErrorKind::Internal, message)
    }
}

#[async_trait]
pub trait ContentAnalyzer: Send + Sync {
    async fn analyze(&self, source_reference: &str) -> CollaboratorResult<ContentDescriptor>;
}

#[async_trait]
pub trait ScriptGenerator: Send + Sync {
    async fn generate(
        &self,
        descriptor: &ContentDescriptor,
        style: VideoStyle,
        duration_minutes: u32,
        custom_instructions: Option<&str>,
    ) -> CollaboratorResult<Script>;
}

#[async_trait]
pub trait NarrationSynthesizer: Send + Sync {
    /// Write narration audio for `text` to `dest`.
    async fn synthesize(&self, text: &str, voice: &str, dest: &Path) -> CollaboratorResult<PathBuf>;
}

#[async_trait]
pub trait ScreenCapture: Send + Sync {
    /// Record a scrolling capture of the source to `dest`.
    async fn capture(
        &self,
        source_reference: &str,
        duration_minutes: u32,
        scroll_speed: ScrollSpeed,
        dest: &Path,
    ) -> CollaboratorResult<PathBuf>;
}

/// Everything the pipeline calls out to.
#[derive(Clone)]
pub struct Collaborators {
    pub analyzer: Arc<dyn ContentAnalyzer>,
    pub scripts: Arc<dyn ScriptGenerator>,
    pub narrator: Arc<dyn NarrationSynthesizer>,
    pub capture: Arc<dyn ScreenCapture>,
    pub avatar: Arc<dyn AvatarRenderer>,
}

impl Collaborators {
    /// Route the four service contracts through one HTTP client.
    pub fn from_service_client(client: ServiceClient, avatar: Arc<dyn AvatarRenderer>) -> Self {
        let client = Arc::new(client);
        Self {
            analyzer: client.clone(),
            scripts: client.clone(),
            narrator: client.clone(),
            capture: client,
            avatar,
        }
    }
}
