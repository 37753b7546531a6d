use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use super::voices::{PremiumVoiceSource, VoiceInfo, VoiceSelection};
use super::{SpeechBackend, SpeechRequest, SpeechSpeed, TtsEngine, TtsError};

const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
const MODEL_ID: &str = "eleven_monolingual_v1";

/// Premium HTTP speech engine.
pub struct ElevenLabsTts {
    client: reqwest::Client,
    base_url: String,
    default_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VoicesResponse {
    #[serde(default)]
    voices: Vec<VoiceInfo>,
}

fn speed_setting(speed: SpeechSpeed) -> f64 {
    match speed {
        SpeechSpeed::Slow => 0.85,
        SpeechSpeed::Normal => 1.0,
        SpeechSpeed::Fast => 1.15,
    }
}

fn check_status(status: StatusCode, body: &str) -> Result<(), TtsError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED => Err(TtsError::InvalidKey),
        StatusCode::TOO_MANY_REQUESTS => Err(TtsError::QuotaExceeded),
        s => Err(TtsError::Request(format!(
            "ElevenLabs API error: {} - {}",
            s,
            body.chars().take(200).collect::<String>()
        ))),
    }
}

fn non_blank(key: Option<&str>) -> Option<&str> {
    key.map(str::trim).filter(|k| !k.is_empty())
}

impl ElevenLabsTts {
    pub fn new(client: reqwest::Client, default_key: Option<String>) -> Self {
        Self {
            client,
            base_url: ELEVENLABS_API_BASE.to_string(),
            default_key,
        }
    }

    /// The caller's key wins over the configured one.
    fn key_for<'a>(&'a self, request: &'a SpeechRequest) -> Option<&'a str> {
        non_blank(request.api_key.as_deref()).or_else(|| non_blank(self.default_key.as_deref()))
    }
}

#[async_trait]
impl SpeechBackend for ElevenLabsTts {
    fn engine(&self) -> TtsEngine {
        TtsEngine::ElevenLabs
    }

    fn accepts(&self, request: &SpeechRequest) -> bool {
        !request.voice.is_free() && self.key_for(request).is_some()
    }

    async fn synthesize(&self, request: &SpeechRequest, output: &Path) -> Result<(), TtsError> {
        let VoiceSelection::Premium { voice_id } = &request.voice else {
            return Err(TtsError::InvalidInput("not a premium voice".to_string()));
        };
        let api_key = self.key_for(request).ok_or(TtsError::InvalidKey)?;

        let response = self
            .client
            .post(format!("{}/text-to-speech/{}", self.base_url, voice_id))
            .header("Accept", "audio/mpeg")
            .header("xi-api-key", api_key)
            .json(&serde_json::json!({
                "text": request.text,
                "model_id": MODEL_ID,
                "voice_settings": {
                    "stability": 0.5,
                    "similarity_boost": 0.75,
                    "speed": speed_setting(request.speed),
                }
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return check_status(status, &body);
        }

        let audio = response.bytes().await?;
        tokio::fs::write(output, &audio).await?;
        info!(bytes = audio.len(), "[ElevenLabs] Audio saved");
        Ok(())
    }
}

#[async_trait]
impl PremiumVoiceSource for ElevenLabsTts {
    async fn list_voices(&self, api_key: &str) -> Result<Vec<VoiceInfo>, TtsError> {
        let response = self
            .client
            .get(format!("{}/voices", self.base_url))
            .header("xi-api-key", api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            check_status(status, &body)?;
            unreachable!("check_status rejects every non-success status");
        }
        let listing: VoicesResponse = response.json().await?;
        Ok(listing.voices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::voices::resolve_voice;

    fn request(voice: &str, api_key: Option<&str>) -> SpeechRequest {
        SpeechRequest {
            text: "Hello".to_string(),
            voice: resolve_voice(voice),
            speed: SpeechSpeed::Normal,
            api_key: api_key.map(str::to_string),
        }
    }

    #[test]
    fn needs_key_and_premium_voice() {
        let keyless = ElevenLabsTts::new(reqwest::Client::new(), None);
        assert!(!keyless.accepts(&request("rachel", None)));
        assert!(!keyless.accepts(&request("rachel", Some("   "))));
        assert!(keyless.accepts(&request("rachel", Some("sk_live"))));
        assert!(!keyless.accepts(&request("gtts_fr", Some("sk_live"))));

        let configured = ElevenLabsTts::new(reqwest::Client::new(), Some("server-key".into()));
        assert!(configured.accepts(&request("adam", None)));
        assert!(configured.accepts(&request("adam", Some(""))));
    }

    #[test]
    fn status_mapping() {
        assert!(check_status(StatusCode::OK, "").is_ok());
        assert!(matches!(check_status(StatusCode::UNAUTHORIZED, ""), Err(TtsError::InvalidKey)));
        assert!(matches!(
            check_status(StatusCode::TOO_MANY_REQUESTS, ""),
            Err(TtsError::QuotaExceeded)
        ));
        match check_status(StatusCode::BAD_GATEWAY, "upstream down") {
            Err(TtsError::Request(msg)) => assert!(msg.contains("502") && msg.contains("upstream down")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn voices_response_parses() {
        let listing: VoicesResponse = serde_json::from_str(
            r#"{"voices":[{"voice_id":"abc","name":"Narrator","category":"premade"}]}"#,
        )
        .unwrap();
        assert_eq!(listing.voices[0].name, "Narrator");
        let empty: VoicesResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.voices.is_empty());
    }
}
