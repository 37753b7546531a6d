use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Tried in order; quota and missing-model failures move on to the next one.
pub const SCRIPT_MODELS: [&str; 3] = ["gemini-2.0-flash-lite", "gemini-2.0-flash", "gemini-2.5-flash"];

/// Images beyond this are not sent to the model.
pub const MAX_SCRIPT_IMAGES: usize = 5;

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error(
        "Gemini API key is required for AI script generation. Add GEMINI_API_KEY to your .env \
         file or paste it in the API Keys section. Get a free key at https://aistudio.google.com/apikey"
    )]
    MissingKey,

    #[error(
        "Gemini API rate limit reached. Please wait about 60 seconds and try again. \
         Free tier has limited requests per minute."
    )]
    RateLimited,

    #[error("AI script generation failed: {0}")]
    Failed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Funny,
    Dramatic,
    Inspirational,
}

impl Tone {
    /// Unknown tones read as professional.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "casual" => Tone::Casual,
            "funny" => Tone::Funny,
            "dramatic" => Tone::Dramatic,
            "inspirational" => Tone::Inspirational,
            _ => Tone::Professional,
        }
    }

    pub fn key(self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Funny => "funny",
            Tone::Dramatic => "dramatic",
            Tone::Inspirational => "inspirational",
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Tone::Professional => "Write in a professional, polished, and informative tone suitable for business or brand content.",
            Tone::Casual => "Write in a casual, friendly, and conversational tone like talking to a friend.",
            Tone::Funny => "Write in a humorous, witty, and entertaining tone with clever wordplay.",
            Tone::Dramatic => "Write in a dramatic, cinematic, and intense tone that builds suspense and emotion.",
            Tone::Inspirational => "Write in an uplifting, motivational, and inspiring tone that moves people.",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptImage {
    pub mime_type: String,
    pub data: Bytes,
}

impl ScriptImage {
    pub fn from_extension(extension: &str, data: Bytes) -> Self {
        let mime_type = match extension {
            "jpg" | "jpeg" => "image/jpeg".to_string(),
            other => format!("image/{}", other),
        };
        Self { mime_type, data }
    }
}

pub fn build_prompt(tone: Tone, custom_instructions: &str) -> String {
    let mut prompt = format!(
        "You are a professional video narration scriptwriter for short-form social media reels \
(Instagram Reels, TikTok, YouTube Shorts).

Your task: Analyze the provided images and write a compelling narration script that tells a \
story connecting all the images in sequence.

Rules:
- {}
- Keep the script between 50-200 words (ideal for 15-60 second reels)
- Write ONLY the narration text, no stage directions, no timestamps, no formatting markers
- Make it flow naturally as spoken word
- Create smooth transitions between image descriptions
- End with a strong closing line or call-to-action
- Do NOT use emojis in the script
- Do NOT include any headings, bullet points, or labels",
        tone.instruction()
    );
    let custom = custom_instructions.trim();
    if !custom.is_empty() {
        prompt.push_str("\n\nAdditional instructions from the user: ");
        prompt.push_str(custom);
    }
    prompt
}

/// Strips markdown emphasis and one pair of surrounding double quotes.
pub fn clean_script(raw: &str) -> String {
    let script = raw.trim().replace("**", "").replace("__", "");
    let script = script.trim();
    match script
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    {
        Some(inner) => inner.trim().to_string(),
        None => script.to_string(),
    }
}

#[derive(Debug, PartialEq)]
enum ModelFailure {
    /// Try the next model.
    Retryable(String),
    Terminal(String),
}

fn classify_failure(status: StatusCode, body: &str) -> ModelFailure {
    let lowered = body.to_lowercase();
    let detail: String = format!("{} {}", status, body).chars().take(300).collect();
    if status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::NOT_FOUND
        || lowered.contains("quota")
        || lowered.contains("rate")
        || lowered.contains("not found")
    {
        ModelFailure::Retryable(detail)
    } else {
        ModelFailure::Terminal(detail)
    }
}

fn extract_text(response: &Value) -> Option<String> {
    let parts = response
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Narration drafts from a vision model over the submitted images.
pub struct ScriptGenerator {
    client: reqwest::Client,
    default_key: Option<String>,
}

impl ScriptGenerator {
    pub fn new(client: reqwest::Client, default_key: Option<String>) -> Self {
        Self { client, default_key }
    }

    fn request_body(images: &[ScriptImage], tone: Tone, custom_instructions: &str) -> Value {
        let mut parts = vec![serde_json::json!({ "text": build_prompt(tone, custom_instructions) })];
        for image in images.iter().take(MAX_SCRIPT_IMAGES) {
            parts.push(serde_json::json!({
                "inline_data": {
                    "mime_type": image.mime_type,
                    "data": BASE64.encode(&image.data),
                }
            }));
        }
        parts.push(serde_json::json!({ "text": "Now write the narration script for these images:" }));
        serde_json::json!({ "contents": [{ "role": "user", "parts": parts }] })
    }

    pub async fn generate(
        &self,
        api_key: Option<&str>,
        images: &[ScriptImage],
        tone: Tone,
        custom_instructions: &str,
    ) -> Result<String, ScriptError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| self.default_key.as_deref())
            .ok_or(ScriptError::MissingKey)?;

        let body = Self::request_body(images, tone, custom_instructions);
        info!(tone = tone.key(), images = images.len().min(MAX_SCRIPT_IMAGES), "[Gemini] Generating script");

        for model in SCRIPT_MODELS {
            let response = self
                .client
                .post(format!("{}/models/{}:generateContent", GEMINI_API_BASE, model))
                .query(&[("key", api_key)])
                .json(&body)
                .send()
                .await
                .map_err(|e| ScriptError::Failed(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let error_text = response.text().await.unwrap_or_default();
                match classify_failure(status, &error_text) {
                    ModelFailure::Retryable(detail) => {
                        warn!(model, detail = %detail, "[Gemini] Model unavailable, trying next");
                        continue;
                    }
                    ModelFailure::Terminal(detail) => return Err(ScriptError::Failed(detail)),
                }
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| ScriptError::Failed(e.to_string()))?;
            let text = extract_text(&payload)
                .ok_or_else(|| ScriptError::Failed("model returned no text".to_string()))?;
            let script = clean_script(&text);
            info!(model, chars = script.len(), "[Gemini] Generated script");
            return Ok(script);
        }

        Err(ScriptError::RateLimited)
    }
}
