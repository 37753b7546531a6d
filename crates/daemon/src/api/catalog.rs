use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use engine::transitions::{catalog, TransitionInfo};
use serde::Deserialize;
use tracing::warn;

use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::media::music::MusicTrackInfo;
use crate::tts::google::PREVIEW_TEXT;
use crate::tts::voices::{free_voice, FALLBACK_FREE_VOICE};
use crate::tts::{TtsError, VoiceCatalog};

#[derive(Debug, Default, Deserialize)]
pub struct VoicesRequest {
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreviewRequest {
    #[serde(default)]
    voice_id: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transitions", get(list_transitions))
        .route("/music", get(list_music))
        .route("/voices", post(list_voices))
        .route("/voice-preview", post(voice_preview))
}

async fn list_transitions() -> Json<Vec<TransitionInfo>> {
    Json(catalog())
}

async fn list_music(State(state): State<AppState>) -> Json<Vec<MusicTrackInfo>> {
    Json(state.music.list().await)
}

/// A missing or malformed body reads as "no key".
async fn list_voices(
    State(state): State<AppState>,
    body: Option<Json<VoicesRequest>>,
) -> Json<VoiceCatalog> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let api_key = request
        .api_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| state.config.elevenlabs_api_key.clone());
    Json(state.voices.catalog(api_key.as_deref()).await)
}

async fn voice_preview(
    State(state): State<AppState>,
    body: Option<Json<PreviewRequest>>,
) -> ApiResult<Response> {
    let request = body.map(|Json(request)| request).unwrap_or_default();
    let voice_id = request.voice_id.unwrap_or_else(|| FALLBACK_FREE_VOICE.id.to_string());
    let voice = free_voice(&voice_id).ok_or_else(|| {
        ApiError::bad_request("Voice preview is only available for free voices")
    })?;

    let audio = state
        .preview
        .render(PREVIEW_TEXT, voice, false)
        .await
        .map_err(|e| {
            warn!(voice = voice.id, error = %e, "Voice preview failed");
            match e {
                TtsError::QuotaExceeded => ApiError::RateLimited(e.to_string()),
                other => ApiError::Upstream(other.to_string()),
            }
        })?;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}
