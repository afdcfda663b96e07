//! HTTP client for the collaborator services.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use avm_models::{ContentDescriptor, Script, ScrollSpeed, VideoStyle};

use super::{
    CollaboratorError, CollaboratorErrorKind, CollaboratorResult, ContentAnalyzer,
    NarrationSynthesizer, ScreenCapture, ScriptGenerator,
};

/// Collaborator service endpoints.
#[derive(Debug, Clone)]
pub struct CollaboratorConfig {
    pub analyzer_url: String,
    pub script_url: String,
    pub tts_url: String,
    pub capture_url: String,
    /// Request timeout; captures and synthesis can take minutes
    pub timeout: Duration,
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            analyzer_url: "http://localhost:8001".to_string(),
            script_url: "http://localhost:8002".to_string(),
            tts_url: "http://localhost:8003".to_string(),
            capture_url: "http://localhost:8004".to_string(),
            timeout: Duration::from_secs(600),
        }
    }
}

impl CollaboratorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            analyzer_url: std::env::var("ANALYZER_URL").unwrap_or(defaults.analyzer_url),
            script_url: std::env::var("SCRIPT_SERVICE_URL").unwrap_or(defaults.script_url),
            tts_url: std::env::var("TTS_SERVICE_URL").unwrap_or(defaults.tts_url),
            capture_url: std::env::var("CAPTURE_SERVICE_URL").unwrap_or(defaults.capture_url),
            timeout: Duration::from_secs(
                std::env::var("COLLABORATOR_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout.as_secs()),
            ),
        }
    }
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    source_reference: &'a str,
}

#[derive(Serialize)]
struct ScriptRequest<'a> {
    descriptor: &'a ContentDescriptor,
    style: VideoStyle,
    duration_minutes: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    custom_instructions: Option<&'a str>,
}

#[derive(Deserialize)]
struct ScriptResponse {
    full_text: String,
    #[serde(default)]
    sections: Vec<avm_models::ScriptSection>,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
    voice: &'a str,
}

#[derive(Serialize)]
struct CaptureRequest<'a> {
    source_reference: &'a str,
    duration_seconds: u32,
    scroll_pause_seconds: f64,
}

/// Map an HTTP status to the collaborator error kind.
pub(crate) fn kind_for_status(status: StatusCode) -> CollaboratorErrorKind {
    match status {
        StatusCode::TOO_MANY_REQUESTS => CollaboratorErrorKind::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CollaboratorErrorKind::Unauthorized,
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            CollaboratorErrorKind::InvalidInput
        }
        s if s.is_client_error() => CollaboratorErrorKind::Rejected,
        _ => CollaboratorErrorKind::Unavailable,
    }
}

fn from_reqwest(service: &str, e: reqwest::Error) -> CollaboratorError {
    let kind = if e.is_timeout() {
        CollaboratorErrorKind::Timeout
    } else if e.is_decode() {
        CollaboratorErrorKind::Internal
    } else {
        CollaboratorErrorKind::Unavailable
    };
    CollaboratorError::new(kind, format!("{} request failed: {}", service, e))
}

/// Client for the analyzer, script, speech and capture services.
pub struct ServiceClient {
    http: Client,
    config: CollaboratorConfig,
}

impl ServiceClient {
    pub fn new(config: CollaboratorConfig) -> CollaboratorResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CollaboratorError::internal(format!("HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn from_env() -> CollaboratorResult<Self> {
        Self::new(CollaboratorConfig::from_env())
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        service: &str,
        url: String,
        body: &B,
    ) -> CollaboratorResult<reqwest::Response> {
        debug!(service, url = %url, "Calling collaborator");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| from_reqwest(service, e))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(CollaboratorError::new(
            kind_for_status(status),
            format!("{} returned {}: {}", service, status, body),
        ))
    }

    async fn post_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        service: &str,
        url: String,
        body: &B,
    ) -> CollaboratorResult<R> {
        self.post(service, url, body)
            .await?
            .json()
            .await
            .map_err(|e| from_reqwest(service, e))
    }

    /// POST and stream the binary response body to `dest` through a
    /// temporary sibling, so large captures never sit in memory.
    async fn post_to_file<B: Serialize + ?Sized>(
        &self,
        service: &str,
        url: String,
        body: &B,
        dest: &Path,
    ) -> CollaboratorResult<PathBuf> {
        let response = self.post(service, url, body).await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        let tmp = dest.with_extension("partial");
        let written = match write_stream(service, response, &tmp).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(e);
            }
        };

        if written == 0 {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CollaboratorError::internal(format!("{} returned no data", service)));
        }

        tokio::fs::rename(&tmp, dest).await.map_err(io_error)?;
        debug!(service, bytes = written, dest = %dest.display(), "Collaborator output saved");
        Ok(dest.to_path_buf())
    }
}

/// Copy a response body to `path` chunk by chunk; returns bytes written.
async fn write_stream(service: &str, response: reqwest::Response, path: &Path) -> CollaboratorResult<u64> {
    let mut file = tokio::fs::File::create(path).await.map_err(io_error)?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| from_reqwest(service, e))?;
        file.write_all(&chunk).await.map_err(io_error)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_error)?;
    Ok(written)
}

fn io_error(e: std::io::Error) -> CollaboratorError {
    CollaboratorError::internal(e.to_string())
}

#[async_trait]
impl ContentAnalyzer for ServiceClient {
    async fn analyze(&self, source_reference: &str) -> CollaboratorResult<ContentDescriptor> {
        self.post_json(
            "analyzer",
            format!("{}/analyze", self.config.analyzer_url),
            &AnalyzeRequest { source_reference },
        )
        .await
    }
}

#[async_trait]
impl ScriptGenerator for ServiceClient {
    async fn generate(
        &self,
        descriptor: &ContentDescriptor,
        style: VideoStyle,
        duration_minutes: u32,
        custom_instructions: Option<&str>,
    ) -> CollaboratorResult<Script> {
        let response: ScriptResponse = self
            .post_json(
                "script",
                format!("{}/script", self.config.script_url),
                &ScriptRequest {
                    descriptor,
                    style,
                    duration_minutes,
                    custom_instructions,
                },
            )
            .await?;

        // Sections are optional; fall back to the header format in the text
        if response.sections.is_empty() {
            Ok(Script::parse(&response.full_text))
        } else {
            Ok(Script::from_sections(response.full_text, response.sections))
        }
    }
}

#[async_trait]
impl NarrationSynthesizer for ServiceClient {
    async fn synthesize(&self, text: &str, voice: &str, dest: &Path) -> CollaboratorResult<PathBuf> {
        self.post_to_file(
            "tts",
            format!("{}/synthesize", self.config.tts_url),
            &SynthesizeRequest { text, voice },
            dest,
        )
        .await
    }
}

#[async_trait]
impl ScreenCapture for ServiceClient {
    async fn capture(
        &self,
        source_reference: &str,
        duration_minutes: u32,
        scroll_speed: ScrollSpeed,
        dest: &Path,
    ) -> CollaboratorResult<PathBuf> {
        self.post_to_file(
            "capture",
            format!("{}/capture", self.config.capture_url),
            &CaptureRequest {
                source_reference,
                duration_seconds: duration_minutes * 60,
                scroll_pause_seconds: scroll_speed.pause_seconds(),
            },
            dest,
        )
        .await
    }
}
