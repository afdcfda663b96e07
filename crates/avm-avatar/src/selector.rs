//! Backend selection, bounded polling and placeholder fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use avm_models::script::truncate_words;
use avm_models::{AvatarProvider, Persona};

use crate::backend::{RenderBackend, RenderRequest, RenderStatus};
use crate::config::AvatarConfig;
use crate::did::DIdBackend;
use crate::error::{AvatarError, AvatarResult};
use crate::heygen::HeyGenBackend;

/// How a clip was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Rendered,
    Placeholder,
}

impl RenderOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderOutcome::Rendered => "rendered",
            RenderOutcome::Placeholder => "placeholder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedClip {
    pub path: PathBuf,
    pub outcome: RenderOutcome,
}

/// Produces one presenter clip for a piece of narration.
#[async_trait]
pub trait AvatarRenderer: Send + Sync {
    /// Render `request` with the backend picked by `provider`.
    ///
    /// Fails only when the render did not succeed and no placeholder clip
    /// exists for the persona.
    async fn render(&self, provider: AvatarProvider, request: &RenderRequest) -> AvatarResult<RenderedClip>;
}

/// [`AvatarRenderer`] over the HeyGen and D-ID backends.
pub struct AvatarSelector {
    heygen: Arc<dyn RenderBackend>,
    did: Arc<dyn RenderBackend>,
    clips_dir: PathBuf,
    placeholder_dir: PathBuf,
}

impl AvatarSelector {
    pub fn new(
        heygen: Arc<dyn RenderBackend>,
        did: Arc<dyn RenderBackend>,
        clips_dir: impl Into<PathBuf>,
        placeholder_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            heygen,
            did,
            clips_dir: clips_dir.into(),
            placeholder_dir: placeholder_dir.into(),
        }
    }

    pub fn from_config(config: &AvatarConfig) -> AvatarResult<Self> {
        let heygen = HeyGenBackend::new(
            config.heygen.clone(),
            config.heygen_voice_id.clone(),
            config.heygen_voice_language.clone(),
        )?;
        let did = DIdBackend::new(config.did.clone(), config.did_voice_id.clone())?;

        info!(
            heygen_enabled = config.heygen.is_enabled(),
            did_enabled = config.did.is_enabled(),
            "Avatar backends configured"
        );

        Ok(Self::new(
            Arc::new(heygen),
            Arc::new(did),
            config.clips_dir.clone(),
            config.placeholder_dir.clone(),
        ))
    }

    pub fn backend_for(&self, provider: AvatarProvider) -> &Arc<dyn RenderBackend> {
        match provider {
            AvatarProvider::HeyGen => &self.heygen,
            AvatarProvider::DId => &self.did,
        }
    }

    /// Submit, poll until done or out of attempts, download.
    async fn render_remote(
        &self,
        backend: &dyn RenderBackend,
        request: &RenderRequest,
    ) -> AvatarResult<PathBuf> {
        let name = backend.name();
        if !backend.is_enabled() {
            return Err(AvatarError::Disabled { backend: name });
        }

        let remote_id = backend.submit(request).await?;
        info!(backend = name, remote_id = %remote_id, "Avatar render submitted");

        let policy = backend.poll_policy();
        for attempt in 1..=policy.max_attempts {
            tokio::time::sleep(policy.interval).await;

            match backend.poll(&remote_id).await? {
                RenderStatus::Pending => {
                    debug!(backend = name, attempt, "Avatar render pending");
                }
                RenderStatus::Done { video_url } => {
                    let dest = self.clips_dir.join(format!("{}_{}.mp4", name, remote_id));
                    backend.download(&video_url, &dest).await?;
                    info!(backend = name, path = %dest.display(), "Avatar clip downloaded");
                    return Ok(dest);
                }
                RenderStatus::Failed(message) => {
                    return Err(AvatarError::render_failed(name, message));
                }
            }
        }

        Err(AvatarError::Timeout {
            backend: name,
            attempts: policy.max_attempts,
        })
    }

    async fn placeholder(&self, backend: &'static str, persona: Persona) -> Option<PathBuf> {
        let candidates = [
            self.placeholder_dir.join(format!("{}_{}.mp4", backend, persona)),
            self.placeholder_dir.join(format!("{}.mp4", persona)),
        ];
        for candidate in candidates {
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file())
}

fn record_render(backend: &'static str, outcome: &'static str) {
    metrics::counter!(
        "avm_avatar_renders_total",
        "backend" => backend,
        "outcome" => outcome
    )
    .increment(1);
}

#[async_trait]
impl AvatarRenderer for AvatarSelector {
    async fn render(&self, provider: AvatarProvider, request: &RenderRequest) -> AvatarResult<RenderedClip> {
        let backend = self.backend_for(provider).as_ref();
        let name = backend.name();

        let mut request = request.clone();
        request.text = truncate_words(&request.text, backend.word_limit());

        let cause = match self.render_remote(backend, &request).await {
            Ok(path) => {
                record_render(name, RenderOutcome::Rendered.as_str());
                return Ok(RenderedClip {
                    path,
                    outcome: RenderOutcome::Rendered,
                });
            }
            Err(AvatarError::Disabled { .. }) => {
                info!(backend = name, "Backend not configured, using placeholder clip");
                "backend not configured".to_string()
            }
            Err(e) => {
                warn!(backend = name, error = %e, "Avatar render failed, trying placeholder");
                e.to_string()
            }
        };

        match self.placeholder(name, request.persona).await {
            Some(path) => {
                record_render(name, RenderOutcome::Placeholder.as_str());
                Ok(RenderedClip {
                    path,
                    outcome: RenderOutcome::Placeholder,
                })
            }
            None => {
                record_render(name, "failed");
                Err(AvatarError::NoPlaceholder {
                    backend: name,
                    persona: request.persona.to_string(),
                    cause,
                })
            }
        }
    }
}
