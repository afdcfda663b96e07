//! Structured job logging.

use tracing::{error, info, warn, Span};

use avm_models::{JobId, PipelineStage};

/// Logs job lifecycle events with the job id and operation attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    operation: String,
}

impl JobLogger {
    /// `operation` is the pipeline mode or task name, e.g. `"screen_recording"`.
    pub fn new(job_id: &JobId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, operation = %self.operation, "Job started: {}", message);
    }

    /// Log entry into a pipeline stage.
    pub fn log_stage(&self, stage: PipelineStage, progress: u8) {
        info!(
            job_id = %self.job_id,
            operation = %self.operation,
            stage = stage.as_str(),
            progress,
            "Job stage: {}", stage.label()
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, operation = %self.operation, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, operation = %self.operation, "Job warning: {}", message);
    }

    /// Raw errors go here and nowhere else.
    pub fn log_error(&self, message: &str) {
        error!(job_id = %self.job_id, operation = %self.operation, "Job error: {}", message);
    }

    pub fn log_completion(&self, message: &str) {
        info!(job_id = %self.job_id, operation = %self.operation, "Job completed: {}", message);
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span to instrument a pipeline task with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, operation = %self.operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_logger_fields() {
        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, "avatar");

        assert_eq!(logger.job_id(), job_id.to_string());
        assert_eq!(logger.operation(), "avatar");
    }
}
