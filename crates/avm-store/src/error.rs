//! Store error types.

use avm_models::{JobId, JobStatus, JobTransitionError};
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    #[error("Job {id} is {status} and can no longer change")]
    Terminal { id: JobId, status: JobStatus },

    #[error("Invalid job transition: {0}")]
    Transition(JobTransitionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Errors caused by the job's lifecycle state rather than storage.
    pub fn is_state_error(&self) -> bool {
        matches!(self, StoreError::Terminal { .. } | StoreError::Transition(_))
    }
}
