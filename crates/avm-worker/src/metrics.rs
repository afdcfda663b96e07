//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

use avm_models::{ErrorCategory, VideoMode};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "avm_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "avm_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "avm_jobs_failed_total";
    pub const JOBS_RUNNING: &str = "avm_jobs_running";
    pub const JOB_DURATION_SECONDS: &str = "avm_job_duration_seconds";
}

pub fn record_job_submitted(mode: VideoMode) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_job_completed(mode: VideoMode, duration_secs: f64) {
    let labels = [("mode", mode.as_str().to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_job_failed(category: ErrorCategory) {
    let labels = [("category", category.metric_label().to_string())];
    counter!(names::JOBS_FAILED_TOTAL, &labels).increment(1);
}

pub fn job_started() {
    gauge!(names::JOBS_RUNNING).increment(1.0);
}

pub fn job_finished() {
    gauge!(names::JOBS_RUNNING).decrement(1.0);
}
