use async_trait::async_trait;
use engine::render::{probe_duration_args, RenderCommand};
use std::io::ErrorKind;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{MediaError, Transcoder};

/// How much of ffmpeg's stderr is kept in error messages.
const STDERR_TAIL_CHARS: usize = 500;

pub struct FFmpegWrapper;

impl FFmpegWrapper {
    async fn exec(
        program: &'static str,
        args: &[String],
        budget: Duration,
    ) -> Result<Output, MediaError> {
        let child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(budget, child).await {
            Err(_) => Err(MediaError::Timeout { program, budget }),
            Ok(Err(e)) if e.kind() == ErrorKind::NotFound => {
                Err(MediaError::EngineUnavailable { program })
            }
            Ok(Err(e)) => Err(MediaError::Io(e)),
            Ok(Ok(output)) => Ok(output),
        }
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let count = text.chars().count();
    if count <= STDERR_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - STDERR_TAIL_CHARS).collect()
}

#[async_trait]
impl Transcoder for FFmpegWrapper {
    async fn run(&self, command: &RenderCommand, budget: Duration) -> Result<(), MediaError> {
        if let Some(parent) = command.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(output = %command.output_path.display(), "Running ffmpeg");

        let output = Self::exec("ffmpeg", &command.ffmpeg_args, budget).await?;
        if !output.status.success() {
            return Err(MediaError::Failed {
                program: "ffmpeg",
                code: output.status.code(),
                stderr: stderr_tail(&output.stderr),
            });
        }
        Ok(())
    }

    async fn probe_duration(&self, media_path: &Path, budget: Duration) -> Option<f64> {
        let output = match Self::exec("ffprobe", &probe_duration_args(media_path), budget).await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(
                    path = %media_path.display(),
                    stderr = %stderr_tail(&output.stderr),
                    "ffprobe failed"
                );
                return None;
            }
            Err(e) => {
                warn!(path = %media_path.display(), error = %e, "ffprobe unavailable");
                return None;
            }
        };
        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parses ffprobe's bare duration line. Non-positive or non-numeric values mean unknown.
fn parse_duration(stdout: &str) -> Option<f64> {
    stdout
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|d| d.is_finite() && *d > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_parsing() {
        assert_eq!(parse_duration("12.345000\n"), Some(12.345));
        assert_eq!(parse_duration("N/A"), None);
        assert_eq!(parse_duration("0.000000"), None);
        assert_eq!(parse_duration(""), None);
    }

    #[test]
    fn stderr_is_truncated_from_the_front() {
        let long = "x".repeat(600) + "final error";
        let tail = stderr_tail(long.as_bytes());
        assert_eq!(tail.chars().count(), STDERR_TAIL_CHARS);
        assert!(tail.ends_with("final error"));
        assert_eq!(stderr_tail(b"  short\n"), "short");
    }
}
