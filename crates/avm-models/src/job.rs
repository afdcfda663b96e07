//! Job records and their lifecycle.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::error_category::ErrorCategory;
use crate::request::JobRequest;
use crate::stage::{PipelineStage, VideoMode};

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Externally visible job status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected job mutation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobTransitionError {
    #[error("job is already {0}")]
    Terminal(JobStatus),

    #[error("stage {stage} is not part of the {mode} plan")]
    StageNotInPlan { stage: PipelineStage, mode: VideoMode },

    #[error("progress cannot go from {from} to {to}")]
    ProgressRegression { from: u8, to: u8 },
}

/// A single video production job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    pub id: JobId,

    pub mode: VideoMode,

    /// The submission this job was created from
    pub request: JobRequest,

    pub status: JobStatus,

    /// Progress percentage (0-100)
    pub progress: u8,

    pub stage: PipelineStage,

    /// Human-readable stage description
    pub stage_label: String,

    /// Path of the deliverable, set once completed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_reference: Option<String>,

    /// Sanitized failure category, set once failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<ErrorCategory>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new processing job for a request.
    pub fn new(id: JobId, request: JobRequest) -> Self {
        let now = Utc::now();
        Self {
            id,
            mode: request.mode,
            request,
            status: JobStatus::Processing,
            progress: 0,
            stage: PipelineStage::Created,
            stage_label: PipelineStage::Created.label().to_string(),
            output_reference: None,
            error_category: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn ensure_processing(&self) -> Result<(), JobTransitionError> {
        if self.is_terminal() {
            return Err(JobTransitionError::Terminal(self.status));
        }
        Ok(())
    }

    /// Move to a working stage and record its progress.
    pub fn enter_stage(&mut self, stage: PipelineStage) -> Result<(), JobTransitionError> {
        self.ensure_processing()?;

        let progress = match stage {
            PipelineStage::Completed | PipelineStage::Failed => None,
            _ => self.mode.progress_for(stage),
        }
        .ok_or(JobTransitionError::StageNotInPlan {
            stage,
            mode: self.mode,
        })?;

        if progress < self.progress {
            return Err(JobTransitionError::ProgressRegression {
                from: self.progress,
                to: progress,
            });
        }

        self.stage = stage;
        self.stage_label = stage.label().to_string();
        self.progress = progress;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job as completed with its deliverable.
    pub fn complete(&mut self, output_reference: impl Into<String>) -> Result<(), JobTransitionError> {
        self.ensure_processing()?;

        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.stage = PipelineStage::Completed;
        self.stage_label = PipelineStage::Completed.label().to_string();
        self.progress = 100;
        self.output_reference = Some(output_reference.into());
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }

    /// Mark the job as failed. Progress stays where the failure happened.
    pub fn fail(&mut self, category: ErrorCategory) -> Result<(), JobTransitionError> {
        self.ensure_processing()?;

        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.stage = PipelineStage::Failed;
        self.stage_label = PipelineStage::Failed.label().to_string();
        self.error_category = Some(category);
        self.updated_at = now;
        self.completed_at = Some(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(mode: VideoMode) -> Job {
        Job::new(
            JobId::new(),
            JobRequest::new("https://github.com/owner/repo", mode),
        )
    }

    #[test]
    fn test_new_job() {
        let job = job(VideoMode::Avatar);
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 0);
        assert_eq!(job.stage_label, "Queued");
        assert!(job.output_reference.is_none());
        assert!(job.error_category.is_none());
    }

    #[test]
    fn test_stage_progression() {
        let mut job = job(VideoMode::Avatar);
        job.enter_stage(PipelineStage::AnalyzingSource).unwrap();
        assert_eq!(job.progress, 10);
        job.enter_stage(PipelineStage::GeneratingScript).unwrap();
        assert_eq!(job.progress, 25);
        assert_eq!(job.stage_label, "Generating script");
    }

    #[test]
    fn test_rejects_regression() {
        let mut job = job(VideoMode::ScreenRecording);
        job.enter_stage(PipelineStage::GeneratingScript).unwrap();
        let err = job.enter_stage(PipelineStage::CapturingScreen).unwrap_err();
        assert_eq!(err, JobTransitionError::ProgressRegression { from: 50, to: 20 });
        assert_eq!(job.progress, 50);
    }

    #[test]
    fn test_rejects_stage_outside_plan() {
        let mut job = job(VideoMode::Avatar);
        assert!(matches!(
            job.enter_stage(PipelineStage::CapturingScreen),
            Err(JobTransitionError::StageNotInPlan { .. })
        ));
        assert!(job.enter_stage(PipelineStage::Completed).is_err());
    }

    #[test]
    fn test_complete_sets_output() {
        let mut job = job(VideoMode::Avatar);
        job.complete("videos/final.mp4").unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert_eq!(job.output_reference.as_deref(), Some("videos/final.mp4"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_is_immutable() {
        let mut job = job(VideoMode::Avatar);
        job.enter_stage(PipelineStage::AnalyzingSource).unwrap();
        job.fail(ErrorCategory::UpstreamUnavailable).unwrap();
        assert_eq!(job.progress, 10);
        assert!(job.output_reference.is_none());

        let before = job.clone();
        assert_eq!(
            job.complete("x.mp4"),
            Err(JobTransitionError::Terminal(JobStatus::Failed))
        );
        assert!(job.enter_stage(PipelineStage::GeneratingScript).is_err());
        assert!(job.fail(ErrorCategory::Internal).is_err());
        assert_eq!(job, before);
    }

    #[test]
    fn test_json_shape() {
        let mut job = job(VideoMode::Avatar);
        job.fail(ErrorCategory::ScriptFailed).unwrap();
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error_category"], "script generation failed");
        assert!(value.get("output_reference").is_none());

        let back: Job = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }
}
