//! Worker error types.

use thiserror::Error;

use avm_models::{JobId, PipelineStage};

use crate::collaborators::CollaboratorError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job {0} has no deliverable yet")]
    NotReady(JobId),

    #[error("{stage} failed: {source}")]
    Collaborator {
        stage: PipelineStage,
        #[source]
        source: CollaboratorError,
    },

    #[error("{stage} failed: {message}")]
    Stage {
        stage: PipelineStage,
        message: String,
    },

    #[error("Avatar error: {0}")]
    Avatar(#[from] avm_avatar::AvatarError),

    #[error("Media error: {0}")]
    Media(#[from] avm_media::MediaError),

    #[error("Store error: {0}")]
    Store(#[from] avm_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn collaborator(stage: PipelineStage, source: CollaboratorError) -> Self {
        Self::Collaborator { stage, source }
    }

    pub fn stage(stage: PipelineStage, msg: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            message: msg.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            WorkerError::NotFound(_) => true,
            WorkerError::Store(e) => e.is_not_found(),
            _ => false,
        }
    }
}
