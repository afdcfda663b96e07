//! Avatar backend configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by one remote backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// API key; the backend is disabled without one
    pub api_key: Option<String>,
    /// Base URL of the API
    pub base_url: String,
    /// Delay between status polls
    pub poll_interval: Duration,
    /// Maximum number of status polls
    pub max_polls: u32,
    /// HTTP request timeout
    pub timeout: Duration,
}

impl BackendConfig {
    pub fn is_enabled(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn heygen_default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.heygen.com".to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 60,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn did_default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.d-id.com".to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 30,
            timeout: Duration::from_secs(30),
        }
    }

    fn from_env(prefix: &str, defaults: Self, poll_interval: Duration) -> Self {
        Self {
            api_key: std::env::var(format!("{prefix}_API_KEY")).ok(),
            base_url: std::env::var(format!("{prefix}_BASE_URL")).unwrap_or(defaults.base_url),
            poll_interval,
            max_polls: std::env::var(format!("{prefix}_MAX_POLLS"))
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_polls),
            timeout: Duration::from_secs(
                std::env::var(format!("{prefix}_TIMEOUT"))
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.timeout.as_secs()),
            ),
        }
    }
}

/// Configuration for the avatar rendering selector.
#[derive(Debug, Clone)]
pub struct AvatarConfig {
    pub heygen: BackendConfig,
    /// HeyGen voice; discovered from the voice list when unset
    pub heygen_voice_id: Option<String>,
    /// Language used for voice discovery
    pub heygen_voice_language: String,
    pub did: BackendConfig,
    /// Voice used by D-ID's text-to-speech provider
    pub did_voice_id: String,
    /// Where downloaded clips are written
    pub clips_dir: PathBuf,
    /// Cached placeholder clips, `{backend}_{persona}.mp4` or `{persona}.mp4`
    pub placeholder_dir: PathBuf,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            heygen: BackendConfig::heygen_default(),
            heygen_voice_id: None,
            heygen_voice_language: "tr".to_string(),
            did: BackendConfig::did_default(),
            did_voice_id: "tr-TR-EmelNeural".to_string(),
            clips_dir: PathBuf::from("videos/avatars"),
            placeholder_dir: PathBuf::from("assets/placeholders"),
        }
    }
}

impl AvatarConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let poll_interval = Duration::from_millis(
            std::env::var("AVATAR_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2000),
        );

        Self {
            heygen: BackendConfig::from_env("HEYGEN", defaults.heygen, poll_interval),
            heygen_voice_id: std::env::var("HEYGEN_VOICE_ID").ok(),
            heygen_voice_language: std::env::var("HEYGEN_VOICE_LANGUAGE")
                .unwrap_or(defaults.heygen_voice_language),
            did: BackendConfig::from_env("DID", defaults.did, poll_interval),
            did_voice_id: std::env::var("DID_VOICE_ID").unwrap_or(defaults.did_voice_id),
            clips_dir: std::env::var("AVM_CLIPS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.clips_dir),
            placeholder_dir: std::env::var("AVM_PLACEHOLDER_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.placeholder_dir),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AvatarConfig::default();
        assert_eq!(config.heygen.max_polls, 60);
        assert_eq!(config.did.max_polls, 30);
        assert_eq!(config.heygen.poll_interval, Duration::from_secs(2));
        assert!(!config.heygen.is_enabled());
    }

    #[test]
    fn test_blank_key_is_disabled() {
        let mut config = BackendConfig::did_default();
        config.api_key = Some("  ".to_string());
        assert!(!config.is_enabled());
        config.api_key = Some("key".to_string());
        assert!(config.is_enabled());
    }
}
