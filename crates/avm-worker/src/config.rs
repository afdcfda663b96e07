//! Worker configuration.

use std::path::PathBuf;

use avm_models::JobId;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the per-job work directories
    pub work_dir: PathBuf,
    /// Where finished deliverables are written
    pub output_dir: PathBuf,
    /// Maximum pipelines running at once
    pub max_concurrent_jobs: usize,
    /// Fallback deliverable used when composition fails
    pub placeholder_deliverable: Option<PathBuf>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/avm"),
            output_dir: PathBuf::from("videos"),
            max_concurrent_jobs: 4,
            placeholder_deliverable: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            work_dir: std::env::var("AVM_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("AVM_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_concurrent_jobs: std::env::var("AVM_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            placeholder_deliverable: std::env::var("AVM_PLACEHOLDER_DELIVERABLE")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Scratch directory for one job's intermediate files.
    pub fn job_work_dir(&self, id: &JobId) -> PathBuf {
        self.work_dir.join(id.as_str())
    }

    /// Final deliverable path for a job.
    pub fn deliverable_path(&self, id: &JobId) -> PathBuf {
        self.output_dir.join(format!("final_{}.mp4", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        let config = WorkerConfig::default();
        let id = JobId::from_string("abc");
        assert_eq!(config.job_work_dir(&id), PathBuf::from("/tmp/avm/abc"));
        assert_eq!(config.deliverable_path(&id), PathBuf::from("videos/final_abc.mp4"));
        assert_eq!(config.max_concurrent_jobs, 4);
    }
}
