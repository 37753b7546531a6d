use async_trait::async_trait;
use engine::compiler::clamp_music_volume;
use engine::render::mix_command;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use super::Transcoder;
use crate::config::StageTimeouts;

/// Mix length used when the narration cannot be probed.
pub const UNKNOWN_NARRATION_SECONDS: f64 = 10.0;

/// Lays a background track under the narration.
///
/// Mixing is best effort: any failure yields the narration path unchanged.
#[async_trait]
pub trait AudioMixer: Send + Sync {
    async fn mix(&self, narration: &Path, music: &Path, volume: f64, output: &Path) -> PathBuf;
}

pub struct FfmpegMixer {
    transcoder: Arc<dyn Transcoder>,
    timeouts: StageTimeouts,
}

impl FfmpegMixer {
    pub fn new(transcoder: Arc<dyn Transcoder>, timeouts: StageTimeouts) -> Self {
        Self {
            transcoder,
            timeouts,
        }
    }
}

#[async_trait]
impl AudioMixer for FfmpegMixer {
    async fn mix(&self, narration: &Path, music: &Path, volume: f64, output: &Path) -> PathBuf {
        if tokio::fs::metadata(music).await.is_err() {
            warn!(music = %music.display(), "Music file not found, using narration only");
            return narration.to_path_buf();
        }

        let duration = self
            .transcoder
            .probe_duration(narration, self.timeouts.probe)
            .await
            .unwrap_or(UNKNOWN_NARRATION_SECONDS);
        let volume = clamp_music_volume(volume);
        let command = mix_command(narration, music, duration, volume, output.to_path_buf());

        match self.transcoder.run(&command, self.timeouts.mix).await {
            Ok(()) => {
                info!(duration, volume, "Mixed narration with background music");
                command.output_path
            }
            Err(e) => {
                warn!(error = %e, "Audio mix failed, falling back to narration only");
                let _ = tokio::fs::remove_file(output).await;
                narration.to_path_buf()
            }
        }
    }
}
