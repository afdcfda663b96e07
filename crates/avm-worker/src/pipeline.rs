//! Per-job stage state machine.
//!
//! A job walks the stage plan of its mode. Entering a stage is persisted
//! before the stage's work starts, so the store always shows the stage
//! that is running. Any error ends the job as failed with a sanitized
//! category; the raw error is only logged.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use avm_avatar::RenderRequest;
use avm_media::fs_utils::copy_file;
use avm_media::{MediaEngine, MediaResult};
use avm_models::{ContentDescriptor, ErrorCategory, Job, JobId, JobRequest, PipelineStage, Script, VideoMode};
use avm_store::JobStore;

use crate::classify::classify;
use crate::collaborators::Collaborators;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;

pub struct Pipeline {
    store: Arc<JobStore>,
    media: Arc<dyn MediaEngine>,
    collaborators: Collaborators,
    config: WorkerConfig,
}

impl Pipeline {
    pub fn new(
        store: Arc<JobStore>,
        media: Arc<dyn MediaEngine>,
        collaborators: Collaborators,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            media,
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Drive a job to a terminal state.
    ///
    /// Failures are recorded on the job, not returned.
    pub async fn run(&self, id: &JobId) {
        let job = match self.store.get(id).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Cannot start pipeline");
                return;
            }
        };

        let logger = JobLogger::new(id, job.mode.as_str());
        logger.log_start(&format!("{} pipeline", job.mode));
        let started = Instant::now();

        metrics::job_started();
        let result = self.execute(&job, &logger).await;
        metrics::job_finished();

        match result {
            Ok(output) => {
                let output_reference = output.to_string_lossy().into_owned();
                match self.store.update(id, |job| job.complete(output_reference)).await {
                    Ok(_) => {
                        metrics::record_job_completed(job.mode, started.elapsed().as_secs_f64());
                        logger.log_completion(&format!("deliverable at {}", output.display()));
                    }
                    Err(e) => logger.log_error(&format!("Could not record completion: {}", e)),
                }
            }
            Err(e) => {
                let category = classify(&e);
                logger.log_error(&format!("{} [{}]", e, category));
                self.fail(id, category, &logger).await;
            }
        }
    }

    async fn fail(&self, id: &JobId, category: ErrorCategory, logger: &JobLogger) {
        match self.store.update(id, |job| job.fail(category)).await {
            Ok(_) => metrics::record_job_failed(category),
            Err(e) => logger.log_error(&format!("Could not record failure: {}", e)),
        }
    }

    /// Persist entry into `stage`.
    async fn enter(&self, id: &JobId, stage: PipelineStage, logger: &JobLogger) -> WorkerResult<()> {
        let job = self.store.update(id, |job| job.enter_stage(stage)).await?;
        logger.log_stage(stage, job.progress);
        Ok(())
    }

    async fn execute(&self, job: &Job, logger: &JobLogger) -> WorkerResult<PathBuf> {
        let id = &job.id;
        let request = &job.request;
        let work_dir = self.config.job_work_dir(id);
        tokio::fs::create_dir_all(&work_dir).await?;

        self.enter(id, PipelineStage::AnalyzingSource, logger).await?;
        let descriptor = self
            .collaborators
            .analyzer
            .analyze(&request.source_reference)
            .await
            .map_err(|e| WorkerError::collaborator(PipelineStage::AnalyzingSource, e))?;
        logger.log_progress(&format!("analyzed {:?} \"{}\"", descriptor.kind, descriptor.title));

        let recording = if job.mode.needs_capture() {
            self.enter(id, PipelineStage::CapturingScreen, logger).await?;
            let recording = self
                .collaborators
                .capture
                .capture(
                    &request.source_reference,
                    request.duration_minutes,
                    request.scroll_speed,
                    &work_dir.join("recording.mp4"),
                )
                .await
                .map_err(|e| WorkerError::collaborator(PipelineStage::CapturingScreen, e))?;
            Some(recording)
        } else {
            None
        };

        self.enter(id, PipelineStage::GeneratingScript, logger).await?;
        let script = self.script_for(request, &descriptor, logger).await?;

        self.enter(id, PipelineStage::SynthesizingAudio, logger).await?;
        let narration = self
            .collaborators
            .narrator
            .synthesize(&script.narration_text(), &request.voice, &work_dir.join("narration.mp3"))
            .await
            .map_err(|e| WorkerError::collaborator(PipelineStage::SynthesizingAudio, e))?;

        let output = self.config.deliverable_path(id);
        match (job.mode, recording) {
            (VideoMode::Avatar, _) => {
                self.enter(id, PipelineStage::RenderingAvatar, logger).await?;
                let clips = self.render_sections(request, &script, logger).await?;

                self.enter(id, PipelineStage::Composing, logger).await?;
                let result = self.compose_avatar(&clips, &narration, &work_dir, &output).await;
                self.finish_composition(result, &output, logger).await
            }
            (VideoMode::ScreenRecording, Some(recording)) => {
                self.enter(id, PipelineStage::Composing, logger).await?;
                let result = self.media.mux(&recording, &narration, &output, true).await;
                self.finish_composition(result, &output, logger).await
            }
            (VideoMode::CustomAvatarOverlay, Some(recording)) => {
                self.enter(id, PipelineStage::RenderingAvatar, logger).await?;
                let opening = script
                    .sections
                    .iter()
                    .map(|s| s.text.as_str())
                    .find(|t| !t.trim().is_empty())
                    .unwrap_or_default();
                let render = RenderRequest::new(opening, request.persona)
                    .with_custom_image(request.custom_avatar_image.clone());
                let clip = self
                    .collaborators
                    .avatar
                    .render(request.provider, &render)
                    .await?;

                self.enter(id, PipelineStage::Composing, logger).await?;
                let result = self
                    .media
                    .circular_overlay(&recording, &clip.path, &narration, &output)
                    .await;
                self.finish_composition(result, &output, logger).await
            }
            (_, None) => Err(WorkerError::stage(
                PipelineStage::CapturingScreen,
                "capture produced no recording",
            )),
        }
    }

    async fn script_for(
        &self,
        request: &JobRequest,
        descriptor: &ContentDescriptor,
        logger: &JobLogger,
    ) -> WorkerResult<Script> {
        let script = match request.approved_script.as_deref() {
            Some(text) => {
                logger.log_progress("using approved script");
                Script::parse(text)
            }
            None => self
                .collaborators
                .scripts
                .generate(
                    descriptor,
                    request.style,
                    request.duration_minutes,
                    request.custom_instructions.as_deref(),
                )
                .await
                .map_err(|e| WorkerError::collaborator(PipelineStage::GeneratingScript, e))?,
        };

        if script.is_empty() {
            return Err(WorkerError::stage(
                PipelineStage::GeneratingScript,
                "script has no narration text",
            ));
        }

        logger.log_progress(&format!(
            "script ready: {} sections, {} words",
            script.sections.len(),
            script.word_count
        ));
        Ok(script)
    }

    /// One avatar clip per non-empty section, in order.
    async fn render_sections(
        &self,
        request: &JobRequest,
        script: &Script,
        logger: &JobLogger,
    ) -> WorkerResult<Vec<PathBuf>> {
        let mut clips = Vec::with_capacity(script.sections.len());
        for (index, section) in script
            .sections
            .iter()
            .filter(|s| !s.text.trim().is_empty())
            .enumerate()
        {
            let render = RenderRequest::new(section.text.clone(), request.persona);
            let clip = self.collaborators.avatar.render(request.provider, &render).await?;
            logger.log_progress(&format!(
                "section {} clip {} ({})",
                index + 1,
                clip.path.display(),
                clip.outcome.as_str()
            ));
            clips.push(clip.path);
        }
        Ok(clips)
    }

    /// Join the clips, then fit them to the narration.
    async fn compose_avatar(
        &self,
        clips: &[PathBuf],
        narration: &Path,
        work_dir: &Path,
        output: &Path,
    ) -> MediaResult<PathBuf> {
        let joined = self
            .media
            .concatenate(clips, &work_dir.join("avatar_joined.mp4"))
            .await?;

        let video_secs = self.media.duration(&joined).await?;
        let audio_secs = self.media.duration(narration).await?;

        if video_secs < audio_secs {
            self.media.loop_match(&joined, narration, output).await
        } else {
            let muxed = self
                .media
                .mux(&joined, narration, &work_dir.join("avatar_muxed.mp4"), false)
                .await?;
            self.media.normalize(&muxed, output).await
        }
    }

    /// Fall back to the placeholder deliverable when composition fails and
    /// one is configured.
    async fn finish_composition(
        &self,
        result: MediaResult<PathBuf>,
        output: &Path,
        logger: &JobLogger,
    ) -> WorkerResult<PathBuf> {
        let error = match result {
            Ok(path) => return Ok(path),
            Err(e) => e,
        };

        let Some(placeholder) = self.config.placeholder_deliverable.as_deref() else {
            return Err(error.into());
        };
        if !tokio::fs::metadata(placeholder).await.is_ok_and(|m| m.is_file()) {
            logger.log_warning(&format!(
                "placeholder deliverable {} is missing",
                placeholder.display()
            ));
            return Err(error.into());
        }

        logger.log_warning(&format!(
            "composition failed, delivering placeholder: {}",
            error
        ));
        copy_file(placeholder, output).await?;
        Ok(output.to_path_buf())
    }
}
