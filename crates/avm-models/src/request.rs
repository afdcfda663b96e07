//! Job submission request and its option enums.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;
use validator::{Validate, ValidationError};

use crate::stage::VideoMode;

/// Narration style requested for the script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStyle {
    #[default]
    Tutorial,
    Review,
    QuickStart,
}

impl VideoStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStyle::Tutorial => "tutorial",
            VideoStyle::Review => "review",
            VideoStyle::QuickStart => "quick_start",
        }
    }
}

/// On-screen presenter persona.
///
/// Unknown persona names deserialize to `ProfessionalFemale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Persona {
    #[default]
    ProfessionalFemale,
    ProfessionalMale,
    CasualFemale,
    CasualMale,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::ProfessionalFemale => "professional_female",
            Persona::ProfessionalMale => "professional_male",
            Persona::CasualFemale => "casual_female",
            Persona::CasualMale => "casual_male",
        }
    }
}

impl From<String> for Persona {
    fn from(value: String) -> Self {
        match value.as_str() {
            "professional_male" => Persona::ProfessionalMale,
            "casual_female" => Persona::CasualFemale,
            "casual_male" => Persona::CasualMale,
            _ => Persona::ProfessionalFemale,
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Remote avatar rendering service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AvatarProvider {
    #[default]
    #[serde(rename = "heygen")]
    HeyGen,
    #[serde(rename = "did")]
    DId,
}

impl AvatarProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvatarProvider::HeyGen => "heygen",
            AvatarProvider::DId => "did",
        }
    }
}

impl fmt::Display for AvatarProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scroll speed of the screen capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScrollSpeed {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl ScrollSpeed {
    /// Pause between scroll steps, in seconds.
    pub fn pause_seconds(&self) -> f64 {
        match self {
            ScrollSpeed::Slow => 3.0,
            ScrollSpeed::Medium => 2.0,
            ScrollSpeed::Fast => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollSpeed::Slow => "slow",
            ScrollSpeed::Medium => "medium",
            ScrollSpeed::Fast => "fast",
        }
    }
}

/// Default narration voice key.
pub const DEFAULT_VOICE: &str = "tr_female_professional";

fn default_duration_minutes() -> u32 {
    3
}

fn default_voice() -> String {
    DEFAULT_VOICE.to_string()
}

/// A request to produce one narrated video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct JobRequest {
    /// Repository URL, web page URL or uploaded document path
    #[validate(custom(function = "validate_source_reference"))]
    pub source_reference: String,

    #[serde(default)]
    pub mode: VideoMode,

    #[serde(default)]
    pub style: VideoStyle,

    /// Target length of the video
    #[serde(default = "default_duration_minutes")]
    #[validate(range(min = 1, max = 30))]
    pub duration_minutes: u32,

    #[serde(default)]
    pub persona: Persona,

    /// Narration voice key
    #[serde(default = "default_voice")]
    #[validate(length(min = 1, max = 64))]
    pub voice: String,

    #[serde(default)]
    pub provider: AvatarProvider,

    #[serde(default)]
    pub scroll_speed: ScrollSpeed,

    /// Presenter image for the overlay mode; an http(s) URL the avatar
    /// services can fetch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_image_url"))]
    pub custom_avatar_image: Option<String>,

    /// Pre-approved script text that bypasses script generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 20000))]
    pub approved_script: Option<String>,

    /// Extra instructions passed to the script generator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub custom_instructions: Option<String>,
}

impl JobRequest {
    /// Create a request with defaults for everything but the source.
    pub fn new(source_reference: impl Into<String>, mode: VideoMode) -> Self {
        Self {
            source_reference: source_reference.into(),
            mode,
            style: VideoStyle::default(),
            duration_minutes: default_duration_minutes(),
            persona: Persona::default(),
            voice: default_voice(),
            provider: AvatarProvider::default(),
            scroll_speed: ScrollSpeed::default(),
            custom_avatar_image: None,
            approved_script: None,
            custom_instructions: None,
        }
    }

    pub fn with_custom_avatar_image(mut self, image: impl Into<String>) -> Self {
        self.custom_avatar_image = Some(image.into());
        self
    }

    pub fn with_approved_script(mut self, script: impl Into<String>) -> Self {
        self.approved_script = Some(script.into());
        self
    }

    /// Validate field constraints and mode-specific requirements.
    pub fn check(&self) -> Result<(), RequestError> {
        self.validate()
            .map_err(|e| RequestError::Invalid(e.to_string()))?;

        if self.mode == VideoMode::CustomAvatarOverlay {
            if self.custom_avatar_image.is_none() {
                return Err(RequestError::MissingAvatarImage);
            }
        }

        Ok(())
    }
}

/// Submission validation failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("custom_avatar_overlay mode requires custom_avatar_image")]
    MissingAvatarImage,
}

/// Accept http(s) URLs, `file://` URLs and plain local paths.
fn validate_source_reference(value: &str) -> Result<(), ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::new("source_reference_empty"));
    }

    if value.contains("://") {
        let url = Url::parse(value).map_err(|_| ValidationError::new("source_reference_url"))?;
        return match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(()),
            "file" => Ok(()),
            _ => Err(ValidationError::new("source_reference_scheme")),
        };
    }

    Ok(())
}

/// Remote renderers fetch the image themselves, so local paths are rejected.
fn validate_image_url(value: &str) -> Result<(), ValidationError> {
    let url = Url::parse(value.trim()).map_err(|_| ValidationError::new("custom_avatar_image_url"))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(()),
        _ => Err(ValidationError::new("custom_avatar_image_scheme")),
    }
}
