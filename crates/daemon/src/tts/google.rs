use async_trait::async_trait;
use reqwest::StatusCode;
use std::path::Path;
use tracing::info;

use super::voices::{FreeVoice, VoiceSelection, FALLBACK_FREE_VOICE};
use super::{SpeechBackend, SpeechRequest, SpeechSpeed, TtsEngine, TtsError};

/// The free endpoint rejects longer inputs.
const MAX_CHUNK_CHARS: usize = 100;

pub const PREVIEW_TEXT: &str = "Hello! This is a preview of how your narration will sound.";

/// Free HTTP speech engine. Accent comes from the regional host of the voice.
pub struct GoogleTts {
    client: reqwest::Client,
}

/// Word-boundary chunks of at most `max_chars` characters. Words longer than
/// the limit are split hard.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let split_at = word
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(word.len());
            chunks.push(word[..split_at].to_string());
            word = &word[split_at..];
        }
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl GoogleTts {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn endpoint(voice: &FreeVoice) -> String {
        format!("https://translate.google.{}/translate_tts", voice.tld)
    }

    /// MP3 bytes for `text`, fetched chunk by chunk and concatenated.
    pub async fn render(&self, text: &str, voice: FreeVoice, slow: bool) -> Result<Vec<u8>, TtsError> {
        let chunks = split_text(text, MAX_CHUNK_CHARS);
        if chunks.is_empty() {
            return Err(TtsError::InvalidInput("No text to speak".to_string()));
        }

        let endpoint = Self::endpoint(&voice);
        let total = chunks.len().to_string();
        let speed = if slow { "0.3" } else { "1" };
        let mut audio = Vec::new();

        for (idx, chunk) in chunks.iter().enumerate() {
            let idx = idx.to_string();
            let textlen = chunk.chars().count().to_string();
            let response = self
                .client
                .get(&endpoint)
                .query(&[
                    ("ie", "UTF-8"),
                    ("q", chunk.as_str()),
                    ("tl", voice.lang),
                    ("client", "tw-ob"),
                    ("ttsspeed", speed),
                    ("total", total.as_str()),
                    ("idx", idx.as_str()),
                    ("textlen", textlen.as_str()),
                ])
                .send()
                .await?;

            match response.status() {
                s if s.is_success() => audio.extend_from_slice(&response.bytes().await?),
                StatusCode::TOO_MANY_REQUESTS => return Err(TtsError::QuotaExceeded),
                s => return Err(TtsError::Request(format!("Google TTS returned {}", s))),
            }
        }

        Ok(audio)
    }
}

#[async_trait]
impl SpeechBackend for GoogleTts {
    fn engine(&self) -> TtsEngine {
        TtsEngine::GoogleTts
    }

    fn accepts(&self, _request: &SpeechRequest) -> bool {
        true
    }

    async fn synthesize(&self, request: &SpeechRequest, output: &Path) -> Result<(), TtsError> {
        let voice = match &request.voice {
            VoiceSelection::Free(voice) => *voice,
            VoiceSelection::Premium { .. } => FALLBACK_FREE_VOICE,
        };
        let audio = self
            .render(&request.text, voice, request.speed == SpeechSpeed::Slow)
            .await?;
        tokio::fs::write(output, &audio).await?;
        info!(
            lang = voice.lang,
            tld = voice.tld,
            bytes = audio.len(),
            "[gTTS] Audio saved"
        );
        Ok(())
    }
}
