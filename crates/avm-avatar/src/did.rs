//! D-ID backend (talks API).

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use avm_models::Persona;

use crate::backend::{download_to, error_for_status, PollPolicy, RenderBackend, RenderRequest, RenderStatus};
use crate::config::BackendConfig;
use crate::error::{AvatarError, AvatarResult};

const NAME: &str = "did";

/// D-ID only renders short scripts reliably.
pub const WORD_LIMIT: usize = 80;

const IMAGE_BUCKET: &str = "https://d-id-public-bucket.s3.amazonaws.com";

/// Stock presenter image per persona.
pub fn source_image(persona: Persona) -> String {
    let file = match persona {
        Persona::ProfessionalFemale => "alice.jpg",
        Persona::ProfessionalMale => "adam.jpg",
        Persona::CasualFemale => "amy.jpg",
        Persona::CasualMale => "mark.jpg",
    };
    format!("{}/{}", IMAGE_BUCKET, file)
}

#[derive(Debug, Deserialize)]
struct CreateTalkResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct TalkStatus {
    status: String,
    result_url: Option<String>,
    error: Option<Value>,
}

pub struct DIdBackend {
    http: Client,
    config: BackendConfig,
    voice_id: String,
}

impl DIdBackend {
    pub fn new(config: BackendConfig, voice_id: impl Into<String>) -> AvatarResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            voice_id: voice_id.into(),
        })
    }

    fn authorization(&self) -> AvatarResult<String> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .map(|k| format!("Basic {}", k))
            .ok_or(AvatarError::Disabled { backend: NAME })
    }

    fn talk_payload(&self, request: &RenderRequest) -> Value {
        let source_url = request
            .custom_image
            .clone()
            .unwrap_or_else(|| source_image(request.persona));

        let script = match request.audio_url.as_deref() {
            Some(audio_url) => json!({ "type": "audio", "audio_url": audio_url }),
            None => json!({
                "type": "text",
                "input": request.text,
                "provider": { "type": "microsoft", "voice_id": self.voice_id },
            }),
        };

        json!({
            "source_url": source_url,
            "script": script,
            "config": { "fluent": true, "result_format": "mp4" },
        })
    }
}

#[async_trait]
impl RenderBackend for DIdBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn word_limit(&self) -> usize {
        WORD_LIMIT
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: self.config.poll_interval,
            max_attempts: self.config.max_polls,
        }
    }

    fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    async fn submit(&self, request: &RenderRequest) -> AvatarResult<String> {
        let response = self
            .http
            .post(format!("{}/talks", self.config.base_url))
            .header("Authorization", self.authorization()?)
            .json(&self.talk_payload(request))
            .send()
            .await?;

        let talk: CreateTalkResponse = error_for_status(NAME, response).await?.json().await?;
        debug!(talk_id = %talk.id, "D-ID talk submitted");
        Ok(talk.id)
    }

    async fn poll(&self, remote_id: &str) -> AvatarResult<RenderStatus> {
        let response = self
            .http
            .get(format!("{}/talks/{}", self.config.base_url, remote_id))
            .header("Authorization", self.authorization()?)
            .send()
            .await?;

        let talk: TalkStatus = error_for_status(NAME, response).await?.json().await?;
        Ok(match talk.status.as_str() {
            "done" => match talk.result_url {
                Some(video_url) => RenderStatus::Done { video_url },
                None => RenderStatus::Failed("done without result_url".to_string()),
            },
            "error" | "rejected" => RenderStatus::Failed(
                talk.error
                    .map(|e| match e {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .unwrap_or_else(|| talk.status.clone()),
            ),
            _ => RenderStatus::Pending,
        })
    }

    async fn download(&self, video_url: &str, dest: &Path) -> AvatarResult<()> {
        download_to(&self.http, NAME, video_url, dest).await
    }
}
