use engine::compiler::{compile_slideshow, concat_list, TitleOverlay};
use engine::render::{
    composition_command, export_command, fallback_command, thumbnail_command,
    title_overlay_command, ExportPlatform,
};
use engine::{plan_timeline, AspectRatio, PlanRequest, Resolution, TimelinePlan, TransitionSpec};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{MediaError, Transcoder};
use crate::config::StageTimeouts;
use crate::jobs::workspace::Workspace;

/// Narration length assumed for planning when the probe cannot tell.
pub const UNKNOWN_AUDIO_SECONDS: f64 = 5.0;

pub struct CompositionRequest<'a> {
    pub images: &'a [PathBuf],
    pub audio: Option<&'a Path>,
    pub transition: TransitionSpec,
    pub aspect_ratio: AspectRatio,
    pub duration_per_image: Option<f64>,
    pub title: Option<&'a TitleOverlay>,
}

#[derive(Debug)]
pub struct Composition {
    pub video_path: PathBuf,
    pub plan: TimelinePlan,
    /// The hard-cut fallback produced the video.
    pub degraded: bool,
    pub titled: bool,
}

/// Drives the transcoder through planning, rendering and the follow-up passes.
pub struct VideoComposer {
    transcoder: Arc<dyn Transcoder>,
    fps: u32,
    timeouts: StageTimeouts,
}

impl VideoComposer {
    pub fn new(transcoder: Arc<dyn Transcoder>, fps: u32, timeouts: StageTimeouts) -> Self {
        Self {
            transcoder,
            fps,
            timeouts,
        }
    }

    /// Renders `reel.mp4` into the workspace.
    ///
    /// A non-zero exit from the transition graph degrades to hard cuts. Timeouts and a
    /// missing engine are fatal, as is a failed fallback. The title pass runs after either
    /// path and never fails the composition.
    pub async fn compose(
        &self,
        request: &CompositionRequest<'_>,
        workspace: &Workspace,
    ) -> Result<Composition, MediaError> {
        let audio_duration = match (request.duration_per_image, request.audio) {
            (None, Some(audio)) => Some(
                self.transcoder
                    .probe_duration(audio, self.timeouts.probe)
                    .await
                    .unwrap_or(UNKNOWN_AUDIO_SECONDS),
            ),
            _ => None,
        };

        let plan = plan_timeline(&PlanRequest {
            image_paths: request.images,
            duration_per_image: request.duration_per_image,
            audio_duration,
            transition_duration: request.transition.duration,
        })?;
        let resolution = request.aspect_ratio.resolution();
        let output = workspace.reel();

        info!(
            images = plan.len(),
            image_duration = plan.image_duration,
            transition = request.transition.kind.key(),
            resolution = %resolution,
            "Composing reel"
        );

        let compiled = compile_slideshow(
            &plan,
            request.transition.kind,
            resolution,
            self.fps,
            request.audio.is_some(),
        );
        let command = composition_command(&plan, &compiled, request.audio, output.clone());

        let degraded = match self.transcoder.run(&command, self.timeouts.compose).await {
            Ok(()) => false,
            Err(MediaError::Failed { stderr, .. }) => {
                warn!(stderr = %stderr, "Transition render failed, falling back to hard cuts");
                self.render_fallback(&plan, request.audio, resolution, workspace)
                    .await?;
                true
            }
            Err(e) => return Err(e),
        };

        let titled = match request.title {
            Some(overlay) => self.apply_title(&output, overlay, resolution, workspace).await,
            None => false,
        };

        Ok(Composition {
            video_path: output,
            plan,
            degraded,
            titled,
        })
    }

    async fn render_fallback(
        &self,
        plan: &TimelinePlan,
        audio: Option<&Path>,
        resolution: Resolution,
        workspace: &Workspace,
    ) -> Result<(), MediaError> {
        let list_path = workspace.concat_list();
        tokio::fs::write(&list_path, concat_list(plan)).await?;

        let command = fallback_command(audio, resolution, list_path, workspace.reel());
        let result = self.transcoder.run(&command, self.timeouts.compose).await;

        if let Err(e) = tokio::fs::remove_file(&command.concat_list_path).await {
            debug!(error = %e, "Could not remove concat list");
        }
        result
    }

    /// Burns the title into `video` in place. Returns whether the overlay was applied.
    pub async fn apply_title(
        &self,
        video: &Path,
        overlay: &TitleOverlay,
        resolution: Resolution,
        workspace: &Workspace,
    ) -> bool {
        let command = title_overlay_command(video, overlay, resolution, workspace.titled_reel());
        if let Err(e) = self.transcoder.run(&command, self.timeouts.title).await {
            warn!(error = %e, "Title overlay failed, keeping untitled video");
            let _ = tokio::fs::remove_file(&command.output_path).await;
            return false;
        }
        match tokio::fs::rename(&command.output_path, video).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Could not replace video with titled version");
                false
            }
        }
    }

    /// Best effort; `None` when the frame could not be extracted.
    pub async fn thumbnail(&self, video: &Path, output: PathBuf) -> Option<PathBuf> {
        let command = thumbnail_command(video, output);
        match self.transcoder.run(&command, self.timeouts.thumbnail).await {
            Ok(()) => Some(command.output_path),
            Err(e) => {
                warn!(error = %e, "Thumbnail generation failed");
                None
            }
        }
    }

    /// Platform re-encode of the workspace's reel, cached after the first success.
    /// Encodes to a scratch file and renames, so a cached export is always complete.
    pub async fn export(
        &self,
        platform: ExportPlatform,
        workspace: &Workspace,
    ) -> Result<PathBuf, MediaError> {
        let target = workspace.export(platform);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!(platform = platform.key(), "Serving cached export");
            return Ok(target);
        }

        let command = export_command(
            &workspace.reel(),
            platform,
            workspace.export_partial(platform),
        );
        if let Err(e) = self.transcoder.run(&command, self.timeouts.export).await {
            let _ = tokio::fs::remove_file(&command.output_path).await;
            return Err(e);
        }
        tokio::fs::rename(&command.output_path, &target).await?;

        info!(platform = platform.key(), "Exported reel");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobId;
    use crate::media::testing::FakeTranscoder;

    struct Fixture {
        _dir: tempfile::TempDir,
        workspace: Workspace,
        images: Vec<PathBuf>,
        audio: PathBuf,
    }

    async fn fixture(images: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path(), &JobId::generate());
        workspace.create().await.unwrap();
        let mut paths = Vec::new();
        for i in 0..images {
            let path = workspace.image(i, "jpg");
            tokio::fs::write(&path, b"jpeg").await.unwrap();
            paths.push(path);
        }
        let audio = workspace.narration();
        tokio::fs::write(&audio, b"mp3").await.unwrap();
        Fixture {
            _dir: dir,
            workspace,
            images: paths,
            audio,
        }
    }

    fn request<'a>(fx: &'a Fixture, title: Option<&'a TitleOverlay>) -> CompositionRequest<'a> {
        CompositionRequest {
            images: &fx.images,
            audio: Some(&fx.audio),
            transition: TransitionSpec::new("wipeleft", 0.5),
            aspect_ratio: AspectRatio::Portrait,
            duration_per_image: None,
            title,
        }
    }

    fn composer(transcoder: Arc<FakeTranscoder>) -> VideoComposer {
        VideoComposer::new(transcoder, 30, StageTimeouts::default())
    }

    #[tokio::test]
    async fn renders_transition_graph() {
        let fx = fixture(3).await;
        let transcoder = Arc::new(FakeTranscoder {
            duration: Some(9.0),
            ..FakeTranscoder::default()
        });
        let result = composer(transcoder.clone())
            .compose(&request(&fx, None), &fx.workspace)
            .await
            .unwrap();

        assert!(!result.degraded);
        assert!(!result.titled);
        assert_eq!(result.plan.image_duration, 3.0);
        assert_eq!(result.video_path, fx.workspace.reel());
        let calls = transcoder.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].iter().any(|a| a.contains("xfade=transition=wipeleft")));
    }

    #[tokio::test]
    async fn unknown_audio_length_plans_five_seconds() {
        let fx = fixture(2).await;
        let transcoder = Arc::new(FakeTranscoder::default());
        let result = composer(transcoder)
            .compose(&request(&fx, None), &fx.workspace)
            .await
            .unwrap();
        assert_eq!(result.plan.image_duration, 2.5);
    }

    #[tokio::test]
    async fn filter_failure_degrades_to_hard_cuts() {
        let fx = fixture(3).await;
        let transcoder = Arc::new(FakeTranscoder::failing_on("xfade"));
        let result = composer(transcoder.clone())
            .compose(&request(&fx, None), &fx.workspace)
            .await
            .unwrap();

        assert!(result.degraded);
        let calls = transcoder.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].windows(2).any(|w| w[0] == "-f" && w[1] == "concat"));
        assert!(!fx.workspace.concat_list().exists());
        assert!(fx.workspace.reel().exists());
    }

    #[tokio::test]
    async fn fallback_failure_is_fatal() {
        let fx = fixture(2).await;
        let transcoder = Arc::new(FakeTranscoder::failing_on("-y"));
        let err = composer(transcoder.clone())
            .compose(&request(&fx, None), &fx.workspace)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Failed { .. }));
        assert_eq!(transcoder.calls().len(), 2);
    }

    #[tokio::test]
    async fn zero_images_is_rejected_before_rendering() {
        let fx = fixture(0).await;
        let transcoder = Arc::new(FakeTranscoder::default());
        let err = composer(transcoder.clone())
            .compose(&request(&fx, None), &fx.workspace)
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::Plan(engine::PlanError::NoImages)));
        assert!(transcoder.calls().is_empty());
    }

    #[tokio::test]
    async fn title_applies_after_degraded_render() {
        let fx = fixture(2).await;
        let overlay = TitleOverlay::new("Summer 2024", "center").unwrap();
        let transcoder = Arc::new(FakeTranscoder::failing_on("xfade"));
        let result = composer(transcoder.clone())
            .compose(&request(&fx, Some(&overlay)), &fx.workspace)
            .await
            .unwrap();

        assert!(result.degraded);
        assert!(result.titled);
        assert!(transcoder.calls()[2].iter().any(|a| a.starts_with("drawtext=")));
        assert!(!fx.workspace.titled_reel().exists());
        assert!(fx.workspace.reel().exists());
    }

    #[tokio::test]
    async fn failed_title_keeps_video() {
        let fx = fixture(2).await;
        let overlay = TitleOverlay::new("Hi", "top").unwrap();
        let transcoder = Arc::new(FakeTranscoder::failing_on("drawtext"));
        let result = composer(transcoder)
            .compose(&request(&fx, Some(&overlay)), &fx.workspace)
            .await
            .unwrap();
        assert!(!result.titled);
        assert!(!result.degraded);
        assert!(fx.workspace.reel().exists());
    }

    #[tokio::test]
    async fn thumbnail_failure_is_none() {
        let fx = fixture(1).await;
        let ok = composer(Arc::new(FakeTranscoder::default()))
            .thumbnail(&fx.workspace.reel(), fx.workspace.thumbnail())
            .await;
        assert_eq!(ok, Some(fx.workspace.thumbnail()));

        let failed = composer(Arc::new(FakeTranscoder::failing_on("-vframes")))
            .thumbnail(&fx.workspace.reel(), fx.workspace.thumbnail())
            .await;
        assert_eq!(failed, None);
    }

    #[tokio::test]
    async fn export_is_encoded_once_then_cached() {
        let fx = fixture(1).await;
        tokio::fs::write(fx.workspace.reel(), b"reel").await.unwrap();
        let transcoder = Arc::new(FakeTranscoder::default());
        let composer = composer(transcoder.clone());

        let first = composer
            .export(ExportPlatform::Instagram, &fx.workspace)
            .await
            .unwrap();
        let second = composer
            .export(ExportPlatform::Instagram, &fx.workspace)
            .await
            .unwrap();

        assert_eq!(first, fx.workspace.export(ExportPlatform::Instagram));
        assert_eq!(first, second);
        assert_eq!(transcoder.calls().len(), 1);

        let mut entries = tokio::fs::read_dir(fx.workspace.root()).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            assert!(!entry.file_name().to_string_lossy().contains("partial"));
        }
    }

    #[tokio::test]
    async fn failed_export_leaves_no_partial_file() {
        let fx = fixture(1).await;
        tokio::fs::write(fx.workspace.reel(), b"reel").await.unwrap();
        let composer = composer(Arc::new(FakeTranscoder::failing_on("-y")));
        assert!(composer
            .export(ExportPlatform::TikTok, &fx.workspace)
            .await
            .is_err());
        assert!(!fx.workspace.export(ExportPlatform::TikTok).exists());
    }
}
