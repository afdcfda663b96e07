//! JSON snapshot job store.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use avm_models::{ErrorCategory, Job, JobId, JobTransitionError};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};

/// On-disk layout: `{ "jobs": { "<id>": Job, ... } }`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    jobs: BTreeMap<JobId, Job>,
}

/// Keyed job persistence with whole-file snapshots.
#[derive(Debug)]
pub struct JobStore {
    path: PathBuf,
    jobs: Mutex<BTreeMap<JobId, Job>>,
}

impl JobStore {
    /// Open the store at `path`.
    ///
    /// A missing file is a fresh start. An unreadable or malformed file is
    /// logged and replaced by an empty store on the next write.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let jobs = load_snapshot(&path).await;
        info!(path = %path.display(), jobs = jobs.len(), "Job store opened");
        Self {
            path,
            jobs: Mutex::new(jobs),
        }
    }

    pub async fn from_config(config: &StoreConfig) -> Self {
        Self::open(&config.path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert a new job.
    pub async fn create(&self, job: Job) -> StoreResult<Job> {
        let mut jobs = self.jobs.lock().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }

        jobs.insert(job.id.clone(), job.clone());
        self.persist(&jobs).await;
        debug!(job_id = %job.id, "Job created");
        Ok(job)
    }

    /// Fetch a copy of a job.
    pub async fn get(&self, id: &JobId) -> StoreResult<Job> {
        self.jobs
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Apply `mutation` to a job and persist the result.
    ///
    /// The mutation runs on a copy; a rejected mutation leaves the stored
    /// job untouched. Terminal jobs are never mutated.
    pub async fn update<F>(&self, id: &JobId, mutation: F) -> StoreResult<Job>
    where
        F: FnOnce(&mut Job) -> Result<(), JobTransitionError>,
    {
        let mut jobs = self.jobs.lock().await;
        let current = jobs
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;

        if current.is_terminal() {
            return Err(StoreError::Terminal {
                id: id.clone(),
                status: current.status,
            });
        }

        let mut updated = current.clone();
        mutation(&mut updated).map_err(|e| match e {
            JobTransitionError::Terminal(status) => StoreError::Terminal {
                id: id.clone(),
                status,
            },
            other => StoreError::Transition(other),
        })?;

        jobs.insert(id.clone(), updated.clone());
        self.persist(&jobs).await;
        Ok(updated)
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.lock().await.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Fail every job that has not reached a terminal state.
    ///
    /// Used at startup: nothing resumes a pipeline that was running when the
    /// previous process stopped. Returns the ids that were failed.
    pub async fn fail_unfinished(&self, category: ErrorCategory) -> Vec<JobId> {
        let mut jobs = self.jobs.lock().await;
        let mut failed = Vec::new();

        for (id, job) in jobs.iter_mut() {
            if job.is_terminal() {
                continue;
            }
            match job.fail(category) {
                Ok(()) => failed.push(id.clone()),
                Err(e) => warn!(job_id = %id, error = %e, "Could not fail interrupted job"),
            }
        }

        if !failed.is_empty() {
            self.persist(&jobs).await;
        }
        failed
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Write the full snapshot. Failures are logged, not returned; the next
    /// successful write carries the in-memory state.
    async fn persist(&self, jobs: &BTreeMap<JobId, Job>) {
        if let Err(e) = write_snapshot(&self.path, jobs).await {
            error!(path = %self.path.display(), error = %e, "Failed to persist job store");
        }
    }
}

async fn load_snapshot(path: &Path) -> BTreeMap<JobId, Job> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!(path = %path.display(), "No job snapshot found, starting empty");
            return BTreeMap::new();
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Job snapshot unreadable, starting empty");
            return BTreeMap::new();
        }
    };

    match serde_json::from_slice::<Snapshot>(&bytes) {
        Ok(snapshot) => snapshot.jobs,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Job snapshot malformed, starting empty");
            BTreeMap::new()
        }
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    jobs: &'a BTreeMap<JobId, Job>,
}

async fn write_snapshot(path: &Path, jobs: &BTreeMap<JobId, Job>) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }

    let bytes = serde_json::to_vec_pretty(&SnapshotRef { jobs })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}
