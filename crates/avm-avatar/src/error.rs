//! Avatar rendering error types.

use thiserror::Error;

pub type AvatarResult<T> = Result<T, AvatarError>;

#[derive(Debug, Error)]
pub enum AvatarError {
    #[error("{backend} is not configured")]
    Disabled { backend: &'static str },

    #[error("{backend} request failed: {message}")]
    RequestFailed {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} render failed: {message}")]
    RenderFailed {
        backend: &'static str,
        message: String,
    },

    #[error("{backend} render still pending after {attempts} polls")]
    Timeout {
        backend: &'static str,
        attempts: u32,
    },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("No placeholder clip for {backend}/{persona} after: {cause}")]
    NoPlaceholder {
        backend: &'static str,
        persona: String,
        cause: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AvatarError {
    pub fn request_failed(backend: &'static str, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            backend,
            message: message.into(),
        }
    }

    pub fn render_failed(backend: &'static str, message: impl Into<String>) -> Self {
        Self::RenderFailed {
            backend,
            message: message.into(),
        }
    }

    /// Whether the remote service could not be reached or did not answer in time.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            AvatarError::Disabled { .. }
                | AvatarError::Timeout { .. }
                | AvatarError::Network(_)
                | AvatarError::NoPlaceholder { .. }
        )
    }
}
