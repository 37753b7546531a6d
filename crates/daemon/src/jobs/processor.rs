use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::{JobId, JobManager, JobRequest, JobResult, JobUpdate, Workspace};
use crate::error::JobError;
use crate::media::{AudioMixer, CompositionRequest, MusicLibrary, VideoComposer};
use crate::tts::{resolve_voice, SpeechRequest, SpeechSynthesizer};

/// Runs one job from uploaded images to a finished reel:
/// narration, optional music bed, composition, thumbnail.
pub struct JobProcessor {
    speech: Arc<dyn SpeechSynthesizer>,
    mixer: Arc<dyn AudioMixer>,
    composer: Arc<VideoComposer>,
    music: MusicLibrary,
    /// Total for the narration stage, across every chunk and fallback engine.
    narration_budget: Duration,
}

/// Resolves to `Err(Cancelled)` as soon as the token fires, dropping `work`.
async fn until_cancelled<F: Future>(
    cancel: &CancellationToken,
    work: F,
) -> Result<F::Output, JobError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(JobError::Cancelled),
        output = work => Ok(output),
    }
}

fn size_mb(bytes: u64) -> f64 {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    (mb * 100.0).round() / 100.0
}

impl JobProcessor {
    pub fn new(
        speech: Arc<dyn SpeechSynthesizer>,
        mixer: Arc<dyn AudioMixer>,
        composer: Arc<VideoComposer>,
        music: MusicLibrary,
        narration_budget: Duration,
    ) -> Self {
        JobProcessor {
            speech,
            mixer,
            composer,
            music,
            narration_budget,
        }
    }

    /// Drives the job to a terminal state. This is the only place that writes
    /// `done` or `error` for a running job.
    pub async fn run(
        &self,
        manager: &JobManager,
        id: &JobId,
        request: JobRequest,
        images: Vec<PathBuf>,
        workspace: Workspace,
        cancel: CancellationToken,
    ) {
        let started = Instant::now();
        match self
            .execute(manager, id, &request, &images, &workspace, &cancel)
            .await
        {
            Ok(result) => {
                info!(
                    job_id = %id,
                    size_mb = result.video_size_mb,
                    degraded = result.degraded,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Job done"
                );
                manager.update(id, JobUpdate::Done(result));
            }
            Err(e) => {
                error!(job_id = %id, error = %e, "Job failed");
                manager.update(id, JobUpdate::Failed(e.user_message()));
            }
        }
    }

    async fn execute(
        &self,
        manager: &JobManager,
        id: &JobId,
        request: &JobRequest,
        images: &[PathBuf],
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> Result<JobResult, JobError> {
        manager.update(id, JobUpdate::progress(20, "Generating narration..."));
        let narration = workspace.narration();
        let speech = SpeechRequest {
            text: request.script.clone(),
            voice: resolve_voice(&request.voice),
            speed: request.speech_speed,
            api_key: request.api_key.clone(),
        };
        let synthesis = tokio::time::timeout(
            self.narration_budget,
            self.speech.synthesize(&speech, &narration),
        );
        let engine = until_cancelled(cancel, synthesis)
            .await?
            .map_err(|_| JobError::Timeout {
                stage: "Narration",
                secs: self.narration_budget.as_secs(),
            })??;

        manager.update(id, JobUpdate::progress(40, "Mixing audio..."));
        let audio = match request.music {
            Some(track) => match self.music.asset(track).await {
                Some(music_path) => {
                    let mixed_path = workspace.mixed_audio();
                    let mix = self.mixer.mix(
                        &narration,
                        &music_path,
                        request.music_volume,
                        &mixed_path,
                    );
                    until_cancelled(cancel, mix).await?
                }
                None => {
                    warn!(job_id = %id, track = track.id(), "Music asset missing, skipping mix");
                    narration.clone()
                }
            },
            None => narration.clone(),
        };

        manager.update(id, JobUpdate::progress(55, "Creating video with transitions..."));
        let composition_request = CompositionRequest {
            images,
            audio: Some(&audio),
            transition: request.transition,
            aspect_ratio: request.aspect_ratio,
            duration_per_image: request.duration_per_image,
            title: request.title.as_ref(),
        };
        let composition = until_cancelled(
            cancel,
            self.composer.compose(&composition_request, workspace),
        )
        .await??;
        if composition.degraded {
            warn!(job_id = %id, "Composition degraded to hard cuts");
        }
        info!(
            job_id = %id,
            frames = composition.plan.len(),
            seconds = composition.plan.total_duration(),
            titled = composition.titled,
            "Reel composed"
        );

        manager.update(id, JobUpdate::progress(85, "Generating thumbnail..."));
        let thumbnail = until_cancelled(
            cancel,
            self.composer
                .thumbnail(&composition.video_path, workspace.thumbnail()),
        )
        .await?;

        let bytes = tokio::fs::metadata(&composition.video_path)
            .await
            .map_err(|e| JobError::Failed {
                stage: "Video generation",
                detail: format!("output missing: {}", e),
            })?
            .len();

        Ok(JobResult {
            job_id: id.clone(),
            video_url: format!("/api/stream/{}", id),
            download_url: format!("/api/download/{}", id),
            thumbnail_url: thumbnail.map(|_| format!("/api/thumbnail/{}", id)),
            video_size_mb: size_mb(bytes),
            num_images: images.len(),
            tts_engine: engine.to_string(),
            degraded: composition.degraded,
        })
    }
}
