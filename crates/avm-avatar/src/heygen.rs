//! HeyGen backend (v2 generate, v1 status).

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use avm_models::Persona;

use crate::backend::{download_to, error_for_status, PollPolicy, RenderBackend, RenderRequest, RenderStatus};
use crate::config::BackendConfig;
use crate::error::{AvatarError, AvatarResult};

const NAME: &str = "heygen";

/// Host for talking photo uploads.
pub const UPLOAD_URL: &str = "https://upload.heygen.com";

/// Safe narration length per render.
pub const WORD_LIMIT: usize = 250;

/// Stock avatar per persona.
pub fn avatar_id(persona: Persona) -> &'static str {
    match persona {
        Persona::ProfessionalFemale => "Daisy-inskirt-20220818",
        Persona::ProfessionalMale => "Josh_lite3_20230714",
        Persona::CasualFemale => "Anna_public_3_20240108",
        Persona::CasualMale => "Lucas_public_2_20240210",
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    code: Option<i64>,
    data: Option<T>,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateData {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct TalkingPhotoData {
    talking_photo_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusData {
    status: String,
    video_url: Option<String>,
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct VoicesData {
    #[serde(default)]
    voices: Vec<Voice>,
}

#[derive(Debug, Deserialize)]
struct Voice {
    voice_id: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    gender: String,
}

pub struct HeyGenBackend {
    http: Client,
    config: BackendConfig,
    voice_language: String,
    voice_id: Mutex<Option<String>>,
    upload_url: String,
    /// Talking photo ids keyed by source image URL
    talking_photos: Mutex<HashMap<String, String>>,
}

impl HeyGenBackend {
    pub fn new(
        config: BackendConfig,
        voice_id: Option<String>,
        voice_language: impl Into<String>,
    ) -> AvatarResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            http,
            config,
            voice_language: voice_language.into(),
            voice_id: Mutex::new(voice_id),
            upload_url: UPLOAD_URL.to_string(),
            talking_photos: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_upload_url(mut self, url: impl Into<String>) -> Self {
        self.upload_url = url.into();
        self
    }

    fn api_key(&self) -> AvatarResult<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AvatarError::Disabled { backend: NAME })
    }

    /// Configured voice, or the first matching voice from the catalogue
    /// (female preferred). Cached after the first lookup.
    async fn voice(&self) -> AvatarResult<String> {
        let mut cached = self.voice_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let response = self
            .http
            .get(format!("{}/v2/voices", self.config.base_url))
            .header("X-Api-Key", self.api_key()?)
            .header("Accept", "application/json")
            .send()
            .await?;
        let envelope: Envelope<VoicesData> = error_for_status(NAME, response).await?.json().await?;

        let language = self.voice_language.to_lowercase();
        let matching: Vec<Voice> = envelope
            .data
            .map(|d| d.voices)
            .unwrap_or_default()
            .into_iter()
            .filter(|v| v.language.to_lowercase().contains(&language))
            .collect();

        let chosen = matching
            .iter()
            .find(|v| v.gender.eq_ignore_ascii_case("female"))
            .or_else(|| matching.first())
            .map(|v| v.voice_id.clone())
            .ok_or_else(|| {
                AvatarError::request_failed(NAME, format!("no voice for language {}", language))
            })?;

        info!(voice_id = %chosen, "Selected HeyGen voice");
        *cached = Some(chosen.clone());
        Ok(chosen)
    }

    /// Upload the image at `image_url` as a talking photo. Each URL is
    /// uploaded once; later segments reuse the id.
    async fn talking_photo(&self, image_url: &str) -> AvatarResult<String> {
        let mut cached = self.talking_photos.lock().await;
        if let Some(id) = cached.get(image_url) {
            return Ok(id.clone());
        }

        let image = error_for_status(NAME, self.http.get(image_url).send().await?).await?;
        let content_type = image
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or("image/jpeg")
            .to_string();
        let bytes = image.bytes().await?;

        let response = self
            .http
            .post(format!("{}/v1/talking_photo", self.upload_url))
            .header("X-Api-Key", self.api_key()?)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let envelope: Envelope<TalkingPhotoData> = error_for_status(NAME, response).await?.json().await?;
        let id = envelope.data.map(|d| d.talking_photo_id).ok_or_else(|| {
            AvatarError::InvalidResponse(format!(
                "HeyGen upload returned no talking photo id: {}",
                describe(envelope.error, envelope.message)
            ))
        })?;

        info!(talking_photo_id = %id, "Uploaded custom avatar image");
        cached.insert(image_url.to_string(), id.clone());
        Ok(id)
    }

    fn generate_payload(&self, request: &RenderRequest, photo_id: Option<&str>, voice_id: Option<&str>) -> Value {
        let character = match photo_id {
            Some(photo) => json!({ "type": "talking_photo", "talking_photo_id": photo }),
            None => json!({ "type": "avatar", "avatar_id": avatar_id(request.persona) }),
        };

        let voice = match (request.audio_url.as_deref(), voice_id) {
            (Some(audio_url), _) => json!({ "type": "audio", "audio_url": audio_url }),
            (None, Some(voice_id)) => json!({
                "type": "text",
                "input_text": request.text,
                "voice_id": voice_id,
            }),
            (None, None) => json!({ "type": "text", "input_text": request.text }),
        };

        json!({
            "video_inputs": [{
                "character": character,
                "voice": voice,
                "background": { "type": "color", "value": "#FFFFFF" },
            }],
            "dimension": { "width": 1280, "height": 720 },
        })
    }
}

fn describe(error: Option<Value>, message: Option<String>) -> String {
    match (error, message) {
        (Some(Value::String(s)), _) => s,
        (Some(v), _) if !v.is_null() => v.to_string(),
        (_, Some(m)) => m,
        _ => "unknown error".to_string(),
    }
}

#[async_trait]
impl RenderBackend for HeyGenBackend {
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
        let api_key = self.api_key()?;
        let voice_id = if request.audio_url.is_some() {
            None
        } else {
            Some(self.voice().await?)
        };

        let photo_id = match request.custom_image.as_deref() {
            Some(image_url) => Some(self.talking_photo(image_url).await?),
            None => None,
        };

        let payload = self.generate_payload(request, photo_id.as_deref(), voice_id.as_deref());
        let response = self
            .http
            .post(format!("{}/v2/video/generate", self.config.base_url))
            .header("X-Api-Key", api_key)
            .json(&payload)
            .send()
            .await?;

        let envelope: Envelope<GenerateData> = error_for_status(NAME, response).await?.json().await?;
        match envelope.data {
            Some(data) => {
                debug!(video_id = %data.video_id, "HeyGen render submitted");
                Ok(data.video_id)
            }
            None => Err(AvatarError::InvalidResponse(format!(
                "HeyGen generate returned no video id: {}",
                describe(envelope.error, envelope.message)
            ))),
        }
    }

    async fn poll(&self, remote_id: &str) -> AvatarResult<RenderStatus> {
        let response = self
            .http
            .get(format!("{}/v1/video_status.get", self.config.base_url))
            .query(&[("video_id", remote_id)])
            .header("X-Api-Key", self.api_key()?)
            .send()
            .await?;

        let envelope: Envelope<StatusData> = error_for_status(NAME, response).await?.json().await?;
        if envelope.code.is_some_and(|c| c != 100) {
            return Ok(RenderStatus::Failed(describe(envelope.error, envelope.message)));
        }

        let data = envelope
            .data
            .ok_or_else(|| AvatarError::InvalidResponse("HeyGen status without data".to_string()))?;

        Ok(match data.status.as_str() {
            "completed" => match data.video_url {
                Some(video_url) => RenderStatus::Done { video_url },
                None => RenderStatus::Failed("completed without video_url".to_string()),
            },
            "failed" | "error" => RenderStatus::Failed(describe(data.error, None)),
            _ => RenderStatus::Pending,
        })
    }

    async fn download(&self, video_url: &str, dest: &Path) -> AvatarResult<()> {
        download_to(&self.http, NAME, video_url, dest).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer, voice: Option<&str>) -> HeyGenBackend {
        let config = BackendConfig {
            api_key: Some("test-key".to_string()),
            base_url: server.uri(),
            poll_interval: Duration::from_millis(1),
            max_polls: 3,
            timeout: Duration::from_secs(5),
        };
        HeyGenBackend::new(config, voice.map(String::from), "tr").unwrap()
    }

    #[test]
    fn test_payload_uses_persona_avatar() {
        let config = BackendConfig::heygen_default();
        let backend = HeyGenBackend::new(config, None, "tr").unwrap();
        let request = RenderRequest::new("Merhaba", Persona::CasualMale);

        let payload = backend.generate_payload(&request, None, Some("v1"));
        let input = &payload["video_inputs"][0];
        assert_eq!(input["character"]["avatar_id"], "Lucas_public_2_20240210");
        assert_eq!(input["voice"]["input_text"], "Merhaba");
        assert_eq!(input["voice"]["voice_id"], "v1");
        assert_eq!(payload["dimension"]["width"], 1280);
    }

    #[test]
    fn test_payload_custom_image_and_audio() {
        let backend = HeyGenBackend::new(BackendConfig::heygen_default(), None, "tr").unwrap();
        let request = RenderRequest::new("x", Persona::default())
            .with_audio_url(Some("https://cdn/voice.mp3".to_string()));

        let payload = backend.generate_payload(&request, Some("photo-123"), None);
        let input = &payload["video_inputs"][0];
        assert_eq!(input["character"]["type"], "talking_photo");
        assert_eq!(input["character"]["talking_photo_id"], "photo-123");
        assert_eq!(input["voice"]["type"], "audio");
    }

    #[tokio::test]
    async fn test_custom_image_uploaded_once_as_talking_photo() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/images/me.png"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(b"\x89PNG".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/talking_photo"))
            .and(header("X-Api-Key", "test-key"))
            .and(header("content-type", "image/png"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"talking_photo_id": "tp-42"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .and(wiremock::matchers::body_partial_json(json!({
                "video_inputs": [{"character": {"type": "talking_photo", "talking_photo_id": "tp-42"}}]
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"video_id": "vid-7"}})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let backend = backend(&server, Some("v")).with_upload_url(server.uri());
        let request = RenderRequest::new("Merhaba", Persona::default())
            .with_custom_image(Some(format!("{}/images/me.png", server.uri())));

        assert_eq!(backend.submit(&request).await.unwrap(), "vid-7");
        assert_eq!(backend.submit(&request).await.unwrap(), "vid-7");
    }

    #[tokio::test]
    async fn test_submit_discovers_voice() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/voices"))
            .and(header("X-Api-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"voices": [
                    {"voice_id": "en-1", "language": "English", "gender": "female"},
                    {"voice_id": "tr-m", "language": "Turkish", "gender": "male"},
                    {"voice_id": "tr-f", "language": "Turkish", "gender": "female"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"video_id": "vid-1"}})),
            )
            .expect(2)
            .mount(&server)
            .await;

        let backend = backend(&server, None);
        let request = RenderRequest::new("Merhaba", Persona::default());
        assert_eq!(backend.submit(&request).await.unwrap(), "vid-1");
        // Voice lookup is cached
        assert_eq!(backend.submit(&request).await.unwrap(), "vid-1");
    }

    #[tokio::test]
    async fn test_poll_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "done"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 100,
                "data": {"status": "completed", "video_url": "https://cdn/x.mp4"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "busy"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 100,
                "data": {"status": "processing"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/video_status.get"))
            .and(query_param("video_id", "bad"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 100,
                "data": {"status": "failed", "error": "avatar not found"}
            })))
            .mount(&server)
            .await;

        let backend = backend(&server, Some("v"));
        assert_eq!(
            backend.poll("done").await.unwrap(),
            RenderStatus::Done {
                video_url: "https://cdn/x.mp4".to_string()
            }
        );
        assert_eq!(backend.poll("busy").await.unwrap(), RenderStatus::Pending);
        assert_eq!(
            backend.poll("bad").await.unwrap(),
            RenderStatus::Failed("avatar not found".to_string())
        );
    }

    #[tokio::test]
    async fn test_submit_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/video/generate"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let backend = backend(&server, Some("v"));
        let err = backend
            .submit(&RenderRequest::new("x", Persona::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AvatarError::RequestFailed { .. }));
    }

    #[tokio::test]
    async fn test_disabled_without_key() {
        let backend = HeyGenBackend::new(BackendConfig::heygen_default(), None, "tr").unwrap();
        assert!(!backend.is_enabled());
        let err = backend
            .submit(&RenderRequest::new("x", Persona::default()))
            .await
            .unwrap_err();
        assert!(matches!(err, AvatarError::Disabled { .. }));
    }
}
