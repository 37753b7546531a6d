pub mod compose;
pub mod ffmpeg;
pub mod mix;
pub mod music;

use async_trait::async_trait;
use engine::render::RenderCommand;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub use compose::{CompositionRequest, VideoComposer};
pub use ffmpeg::FFmpegWrapper;
pub use mix::{AudioMixer, FfmpegMixer};
pub use music::{MusicLibrary, MusicTrack};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{program} not found. Install FFmpeg and add it to your PATH.")]
    EngineUnavailable { program: &'static str },

    #[error("{program} timed out after {}s", .budget.as_secs())]
    Timeout {
        program: &'static str,
        budget: Duration,
    },

    #[error("{program} exited with status {code:?}: {stderr}")]
    Failed {
        program: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error(transparent)]
    Plan(#[from] engine::PlanError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The external media engine. Every invocation carries its own wall-clock budget
/// and the child process is killed when the budget runs out.
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn run(&self, command: &RenderCommand, budget: Duration) -> Result<(), MediaError>;

    /// Container duration in seconds; `None` when it cannot be determined.
    async fn probe_duration(&self, media_path: &Path, budget: Duration) -> Option<f64>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Big enough that a rounded size in megabytes is non-zero.
    pub const OUTPUT_BYTES: usize = 16 * 1024;

    /// Records every command and writes a placeholder to each output path.
    /// Commands whose arguments contain `fail_on` exit with an error instead,
    /// after writing their output when `partial_output` is set.
    #[derive(Default)]
    pub struct FakeTranscoder {
        pub calls: Mutex<Vec<Vec<String>>>,
        pub fail_on: Option<&'static str>,
        pub partial_output: bool,
        pub duration: Option<f64>,
    }

    impl FakeTranscoder {
        pub fn failing_on(pattern: &'static str) -> Self {
            Self {
                fail_on: Some(pattern),
                ..Self::default()
            }
        }

        /// Like a real encoder that dies mid-run: the output file exists afterwards.
        pub fn failing_after_output(pattern: &'static str) -> Self {
            Self {
                partial_output: true,
                ..Self::failing_on(pattern)
            }
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transcoder for FakeTranscoder {
        async fn run(&self, command: &RenderCommand, _budget: Duration) -> Result<(), MediaError> {
            self.calls.lock().unwrap().push(command.ffmpeg_args.clone());
            let fails = self
                .fail_on
                .is_some_and(|pattern| command.ffmpeg_args.iter().any(|a| a.contains(pattern)));
            if fails && !self.partial_output {
                return Err(MediaError::Failed {
                    program: "ffmpeg",
                    code: Some(1),
                    stderr: format!("No such filter: '{}'", self.fail_on.unwrap_or_default()),
                });
            }
            tokio::fs::write(&command.output_path, vec![0u8; OUTPUT_BYTES]).await?;
            if fails {
                return Err(MediaError::Failed {
                    program: "ffmpeg",
                    code: Some(1),
                    stderr: "Conversion failed!".to_string(),
                });
            }
            Ok(())
        }

        async fn probe_duration(&self, _media_path: &Path, _budget: Duration) -> Option<f64> {
            self.duration
        }
    }
}
