//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use avm_avatar::{AvatarConfig, AvatarSelector};
use avm_media::{check_ffmpeg, check_ffprobe, FfmpegEngine, OverlayOptions};
use avm_models::PlaybackProfile;
use avm_store::{JobStore, StoreConfig};
use avm_worker::{Collaborators, JobService, Pipeline, ServiceClient, WorkerConfig};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jobs: JobService,
}

impl AppState {
    pub fn new(config: ApiConfig, jobs: JobService) -> Self {
        Self { config, jobs }
    }

    /// Wire the store, avatar backends, collaborator client and media
    /// engine from environment variables.
    pub async fn from_env(config: ApiConfig) -> anyhow::Result<Self> {
        let store = Arc::new(JobStore::from_config(&StoreConfig::from_env()).await);

        if let Err(e) = check_ffmpeg().and_then(|_| check_ffprobe()) {
            warn!("{}; video composition will fail until it is installed", e);
        }
        let media = FfmpegEngine::new(PlaybackProfile::default(), OverlayOptions::from_env());

        let avatar = AvatarSelector::from_config(&AvatarConfig::from_env())?;
        let collaborators = Collaborators::from_service_client(ServiceClient::from_env()?, Arc::new(avatar));

        let worker_config = WorkerConfig::from_env();
        info!(
            work_dir = %worker_config.work_dir.display(),
            output_dir = %worker_config.output_dir.display(),
            max_concurrent_jobs = worker_config.max_concurrent_jobs,
            "Worker configured"
        );

        let pipeline = Pipeline::new(Arc::clone(&store), Arc::new(media), collaborators, worker_config);
        let jobs = JobService::new(store, pipeline);

        let interrupted = jobs.recover_interrupted().await;
        if interrupted > 0 {
            warn!(count = interrupted, "Failed jobs interrupted by the previous shutdown");
        }

        Ok(Self::new(config, jobs))
    }
}
