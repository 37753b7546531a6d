pub mod elevenlabs;
pub mod google;
pub mod voices;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub use elevenlabs::ElevenLabsTts;
pub use google::GoogleTts;
pub use voices::{resolve_voice, VoiceCatalog, VoiceDirectory, VoiceSelection};

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("API key is invalid or expired (401)")]
    InvalidKey,

    #[error("rate limit or quota exceeded (429)")]
    QuotaExceeded,

    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("speech request failed: {0}")]
    Request(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TtsError {
    /// Terminal errors stop the fallback chain; everything else moves on to the next engine.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TtsError::InvalidInput(_) | TtsError::Io(_))
    }
}

impl From<reqwest::Error> for TtsError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            TtsError::EngineUnavailable(err.to_string())
        } else {
            TtsError::Request(err.to_string())
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeechSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

impl SpeechSpeed {
    /// Unknown values mean normal speed.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "slow" => SpeechSpeed::Slow,
            "fast" => SpeechSpeed::Fast,
            _ => SpeechSpeed::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsEngine {
    ElevenLabs,
    GoogleTts,
}

impl TtsEngine {
    pub fn display_name(self) -> &'static str {
        match self {
            TtsEngine::ElevenLabs => "ElevenLabs",
            TtsEngine::GoogleTts => "Google TTS",
        }
    }
}

impl fmt::Display for TtsEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: VoiceSelection,
    pub speed: SpeechSpeed,
    /// Caller-supplied premium key; backends fall back to their configured key.
    pub api_key: Option<String>,
}

/// One concrete engine in the fallback chain.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    fn engine(&self) -> TtsEngine;

    /// Whether this engine can serve the request at all, e.g. it has a key for it.
    fn accepts(&self, request: &SpeechRequest) -> bool;

    async fn synthesize(&self, request: &SpeechRequest, output: &Path) -> Result<(), TtsError>;
}

/// Narration for a job: writes audio to `output` and reports which engine produced it.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SpeechRequest, output: &Path)
        -> Result<TtsEngine, TtsError>;
}

/// Tries each backend in order. Backends that decline the request are skipped,
/// non-terminal failures move on to the next one.
pub struct FallbackSynthesizer {
    backends: Vec<Arc<dyn SpeechBackend>>,
}

impl FallbackSynthesizer {
    pub fn new(backends: Vec<Arc<dyn SpeechBackend>>) -> Self {
        Self { backends }
    }
}

#[async_trait]
impl SpeechSynthesizer for FallbackSynthesizer {
    async fn synthesize(
        &self,
        request: &SpeechRequest,
        output: &Path,
    ) -> Result<TtsEngine, TtsError> {
        if request.text.trim().is_empty() {
            return Err(TtsError::InvalidInput(
                "Please provide a narration script".to_string(),
            ));
        }

        let mut last_error = None;
        for backend in self.backends.iter().filter(|b| b.accepts(request)) {
            let engine = backend.engine();
            match backend.synthesize(request, output).await {
                Ok(()) => {
                    info!(engine = %engine, "Narration synthesized");
                    return Ok(engine);
                }
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    warn!(engine = %engine, error = %e, "Speech engine failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            TtsError::EngineUnavailable("no speech engine accepted the request".to_string())
        }))
    }
}
