//! Daemon configuration, read from the environment (and `.env` when present).

use std::path::PathBuf;
use std::time::Duration;

/// Wall-clock budget for each external-process or upstream invocation.
#[derive(Debug, Clone)]
pub struct StageTimeouts {
    pub compose: Duration,
    pub thumbnail: Duration,
    pub title: Duration,
    pub export: Duration,
    pub mix: Duration,
    pub probe: Duration,
    pub tts: Duration,
    /// Whole narration stage; `tts` bounds each upstream request.
    pub narration: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            compose: Duration::from_secs(300),
            thumbnail: Duration::from_secs(30),
            title: Duration::from_secs(120),
            export: Duration::from_secs(120),
            mix: Duration::from_secs(60),
            probe: Duration::from_secs(10),
            tts: Duration::from_secs(60),
            narration: Duration::from_secs(300),
        }
    }
}

/// Submission limits enforced before a job exists.
#[derive(Debug, Clone)]
pub struct Limits {
    pub max_images: usize,
    pub max_upload_bytes: usize,
    pub max_script_chars: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_images: 20,
            max_upload_bytes: 50 * 1024 * 1024,
            max_script_chars: 5000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    /// Parent of every per-job workspace.
    pub output_dir: PathBuf,
    pub music_dir: PathBuf,
    pub static_dir: PathBuf,
    pub retention: Duration,
    pub sweep_interval: Duration,
    pub rate_limit_interval: Duration,
    pub fps: u32,
    pub elevenlabs_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    pub limits: Limits,
    pub timeouts: StageTimeouts,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            output_dir: PathBuf::from("output"),
            music_dir: PathBuf::from("static/music"),
            static_dir: PathBuf::from("static"),
            retention: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(1800),
            rate_limit_interval: Duration::from_secs(10),
            fps: engine::DEFAULT_FPS,
            elevenlabs_api_key: None,
            gemini_api_key: None,
            limits: Limits::default(),
            timeouts: StageTimeouts::default(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env_parse::<u64>(key)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_secret(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeouts = StageTimeouts {
            compose: env_secs("COMPOSE_TIMEOUT_SECS", defaults.timeouts.compose),
            thumbnail: env_secs("THUMBNAIL_TIMEOUT_SECS", defaults.timeouts.thumbnail),
            title: env_secs("TITLE_TIMEOUT_SECS", defaults.timeouts.title),
            export: env_secs("EXPORT_TIMEOUT_SECS", defaults.timeouts.export),
            mix: env_secs("MIX_TIMEOUT_SECS", defaults.timeouts.mix),
            probe: env_secs("PROBE_TIMEOUT_SECS", defaults.timeouts.probe),
            tts: env_secs("TTS_TIMEOUT_SECS", defaults.timeouts.tts),
            narration: env_secs("NARRATION_TIMEOUT_SECS", defaults.timeouts.narration),
        };
        let limits = Limits {
            max_images: env_parse("MAX_IMAGES").unwrap_or(defaults.limits.max_images),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES")
                .unwrap_or(defaults.limits.max_upload_bytes),
            max_script_chars: env_parse("MAX_SCRIPT_CHARS")
                .unwrap_or(defaults.limits.max_script_chars),
        };

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            music_dir: std::env::var("MUSIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.music_dir),
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
            retention: env_secs("JOB_RETENTION_SECS", defaults.retention),
            sweep_interval: env_secs("SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            rate_limit_interval: env_secs("RATE_LIMIT_SECS", defaults.rate_limit_interval),
            fps: env_parse("VIDEO_FPS").unwrap_or(defaults.fps),
            elevenlabs_api_key: env_secret("ELEVENLABS_API_KEY"),
            gemini_api_key: env_secret("GEMINI_API_KEY"),
            limits,
            timeouts,
        }
    }
}
