use axum::{
    extract::{ConnectInfo, Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use engine::compiler::TitleOverlay;
use engine::{AspectRatio, TransitionSpec, DEFAULT_TRANSITION_SECONDS};
use serde::Serialize;
use std::net::SocketAddr;
use tracing::warn;

use super::form::UploadForm;
use super::AppState;
use crate::config::Limits;
use crate::error::{ApiError, ApiResult};
use crate::jobs::{JobId, JobRequest};
use crate::media::music::DEFAULT_MUSIC_VOLUME;
use crate::media::MusicTrack;
use crate::tts::voices::DEFAULT_VOICE;
use crate::tts::SpeechSpeed;

#[derive(Serialize)]
pub struct GenerateResponse {
    success: bool,
    job_id: JobId,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

async fn generate(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    multipart: Multipart,
) -> ApiResult<Json<GenerateResponse>> {
    if !state.gate.check(peer.ip()) {
        warn!(client = %peer.ip(), "Submission rate limited");
        return Err(ApiError::RateLimited(
            "Please wait a few seconds before generating again.".to_string(),
        ));
    }

    let mut form = UploadForm::read(multipart, state.config.limits.max_upload_bytes).await?;
    let request = job_request(&form, &state.config.limits)?;
    let images = std::mem::take(&mut form.photos);

    let job_id = state.jobs.submit(request, images).await?;
    Ok(Json(GenerateResponse {
        success: true,
        job_id,
    }))
}

/// Validates the submission in the order clients expect errors: photos, then script.
fn job_request(form: &UploadForm, limits: &Limits) -> ApiResult<JobRequest> {
    if !form.has_photo_parts {
        return Err(ApiError::validation("No photos uploaded"));
    }
    if form.photos.is_empty() {
        return Err(ApiError::validation(
            "No valid image files. Supported: PNG, JPG, JPEG, WebP, BMP, GIF",
        ));
    }
    if form.photos.len() > limits.max_images {
        return Err(ApiError::validation(format!(
            "Maximum {} images allowed",
            limits.max_images
        )));
    }

    let script = form
        .text("script")
        .ok_or_else(|| ApiError::validation("Please provide a narration script"))?;
    if script.chars().count() > limits.max_script_chars {
        return Err(ApiError::validation(format!(
            "Script too long. Maximum {} characters.",
            limits.max_script_chars
        )));
    }

    let transition_duration = form
        .number("transition_duration")?
        .unwrap_or(DEFAULT_TRANSITION_SECONDS);

    Ok(JobRequest {
        script: script.to_string(),
        voice: form.text_or("voice", DEFAULT_VOICE).to_string(),
        speech_speed: SpeechSpeed::parse(form.text_or("speech_speed", "normal")),
        api_key: form.text("api_key").map(str::to_string),
        transition: TransitionSpec::new(form.text_or("transition", "fade"), transition_duration),
        aspect_ratio: AspectRatio::parse(form.text_or("aspect_ratio", "9:16")),
        duration_per_image: form.number("duration_per_image")?,
        title: form.text("title_text").and_then(|text| {
            TitleOverlay::new(text, form.text_or("title_position", "top"))
        }),
        music: form.text("music").and_then(MusicTrack::from_id),
        music_volume: form
            .number("music_volume")?
            .unwrap_or(DEFAULT_MUSIC_VOLUME),
    })
}
