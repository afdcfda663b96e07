//! Job submission and lookup.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, warn, Instrument};

use avm_models::{ErrorCategory, Job, JobId, JobRequest, JobStatus, RequestError};
use avm_store::{JobStore, StoreError};

use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::Pipeline;

/// Entry point for callers: submit jobs, read their state, fetch results.
///
/// Each submitted job runs on its own task. A semaphore caps how many
/// pipelines execute at once; the rest wait at progress 0.
#[derive(Clone)]
pub struct JobService {
    store: Arc<JobStore>,
    pipeline: Arc<Pipeline>,
    permits: Arc<Semaphore>,
}

impl JobService {
    pub fn new(store: Arc<JobStore>, pipeline: Pipeline) -> Self {
        let permits = Arc::new(Semaphore::new(pipeline.config().max_concurrent_jobs.max(1)));
        Self {
            store,
            pipeline: Arc::new(pipeline),
            permits,
        }
    }

    /// Fail jobs left unfinished by a previous process.
    ///
    /// Call once at startup, before accepting submissions.
    pub async fn recover_interrupted(&self) -> usize {
        let failed = self.store.fail_unfinished(ErrorCategory::Internal).await;
        for id in &failed {
            warn!(job_id = %id, "Job interrupted by restart, marked failed");
            metrics::record_job_failed(ErrorCategory::Internal);
        }
        failed.len()
    }

    /// Validate and persist a new job, then start its pipeline.
    pub async fn submit(&self, request: JobRequest) -> WorkerResult<Job> {
        request.check().map_err(|e| match e {
            RequestError::Invalid(msg) => WorkerError::validation(msg),
            other => WorkerError::validation(other.to_string()),
        })?;

        let job = self.store.create(Job::new(JobId::new(), request)).await?;
        metrics::record_job_submitted(job.mode);
        info!(job_id = %job.id, mode = %job.mode, "Job submitted");

        let id = job.id.clone();
        let store = Arc::clone(&self.store);
        let pipeline = Arc::clone(&self.pipeline);
        let permits = Arc::clone(&self.permits);
        let logger = JobLogger::new(&id, job.mode.as_str());
        let span = logger.create_span();

        tokio::spawn(
            async move {
                // Closed only on shutdown
                let Ok(_permit) = permits.acquire_owned().await else {
                    logger.log_warning("service closed before the job started");
                    match store.update(&id, |job| job.fail(ErrorCategory::Internal)).await {
                        Ok(_) => metrics::record_job_failed(ErrorCategory::Internal),
                        Err(e) => logger.log_error(&format!("Could not record failure: {}", e)),
                    }
                    return;
                };
                pipeline.run(&id).await;
            }
            .instrument(span),
        );

        Ok(job)
    }

    pub async fn status(&self, id: &JobId) -> WorkerResult<Job> {
        self.store.get(id).await.map_err(not_found)
    }

    /// Path of a completed job's deliverable.
    pub async fn deliverable(&self, id: &JobId) -> WorkerResult<PathBuf> {
        let job = self.status(id).await?;
        match (job.status, job.output_reference) {
            (JobStatus::Completed, Some(output)) => Ok(PathBuf::from(output)),
            _ => Err(WorkerError::NotReady(id.clone())),
        }
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<Job> {
        self.store.list().await
    }

    /// Stop admitting queued jobs. Queued jobs fail as internal errors;
    /// running pipelines finish.
    pub fn close(&self) {
        self.permits.close();
    }
}

fn not_found(e: StoreError) -> WorkerError {
    match e {
        StoreError::NotFound(id) => WorkerError::NotFound(id),
        other => WorkerError::Store(other),
    }
}
