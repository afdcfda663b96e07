//! Backend contract shared by all avatar services.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;

use avm_models::Persona;

use crate::error::{AvatarError, AvatarResult};

/// What to render.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// Narration text, truncated to the backend's word limit before submit
    pub text: String,
    pub persona: Persona,
    /// Presenter image replacing the persona's stock avatar
    pub custom_image: Option<String>,
    /// Pre-generated speech the backend should lip-sync instead of
    /// synthesizing its own
    pub audio_url: Option<String>,
}

impl RenderRequest {
    pub fn new(text: impl Into<String>, persona: Persona) -> Self {
        Self {
            text: text.into(),
            persona,
            custom_image: None,
            audio_url: None,
        }
    }

    pub fn with_custom_image(mut self, image: Option<String>) -> Self {
        self.custom_image = image;
        self
    }

    pub fn with_audio_url(mut self, audio_url: Option<String>) -> Self {
        self.audio_url = audio_url;
        self
    }
}

/// Remote job state reported by a status poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderStatus {
    Pending,
    Done { video_url: String },
    Failed(String),
}

/// Fixed-interval polling with an attempt ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// A remote avatar rendering service.
#[async_trait]
pub trait RenderBackend: Send + Sync {
    /// Short name used in file names, logs and metrics.
    fn name(&self) -> &'static str;

    /// Longest text (in words) the service handles reliably.
    fn word_limit(&self) -> usize;

    fn poll_policy(&self) -> PollPolicy;

    /// Whether the backend has credentials to talk to its service.
    fn is_enabled(&self) -> bool;

    /// Start a render; returns the remote job id.
    async fn submit(&self, request: &RenderRequest) -> AvatarResult<String>;

    /// Check a remote job.
    async fn poll(&self, remote_id: &str) -> AvatarResult<RenderStatus>;

    /// Fetch a finished video to `dest`.
    async fn download(&self, video_url: &str, dest: &Path) -> AvatarResult<()>;
}

/// Stream a URL to a file, writing through a temporary sibling.
pub(crate) async fn download_to(
    http: &Client,
    backend: &'static str,
    url: &str,
    dest: &Path,
) -> AvatarResult<()> {
    let response = http.get(url).send().await?;
    if !response.status().is_success() {
        return Err(AvatarError::request_failed(
            backend,
            format!("download returned {}", response.status()),
        ));
    }

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = dest.with_extension("download");
    let mut file = tokio::fs::File::create(&tmp).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                drop(file);
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e.into());
            }
        };
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    drop(file);

    tokio::fs::rename(&tmp, dest).await?;
    Ok(())
}

/// Map a non-success HTTP response to an error carrying the body.
pub(crate) async fn error_for_status(
    backend: &'static str,
    response: reqwest::Response,
) -> AvatarResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(AvatarError::request_failed(
        backend,
        format!("{} returned {}: {}", backend, status, body),
    ))
}
