use axum::{
    extract::{Multipart, State},
    response::Json,
    routing::post,
    Router,
};
use serde::Serialize;
use tracing::error;

use super::form::UploadForm;
use super::AppState;
use crate::error::{ApiError, ApiResult};
use crate::llm::{ScriptImage, Tone, MAX_SCRIPT_IMAGES};

#[derive(Serialize)]
pub struct ScriptResponse {
    success: bool,
    script: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/generate-script", post(generate_script))
}

async fn generate_script(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<ScriptResponse>> {
    let form = UploadForm::read(multipart, state.config.limits.max_upload_bytes).await?;
    if !form.has_photo_parts {
        return Err(ApiError::validation("No photos uploaded"));
    }
    if form.photos.is_empty() {
        return Err(ApiError::validation("No valid images found"));
    }

    let images: Vec<ScriptImage> = form
        .photos
        .iter()
        .take(MAX_SCRIPT_IMAGES)
        .map(|photo| ScriptImage::from_extension(&photo.extension, photo.data.clone()))
        .collect();
    let tone = Tone::parse(form.text_or("tone", "professional"));
    let custom_prompt = form.text_or("custom_prompt", "");

    let script = state
        .scripts
        .generate(form.text("gemini_api_key"), &images, tone, custom_prompt)
        .await
        .map_err(|e| {
            error!(error = %e, "Script generation failed");
            ApiError::from(e)
        })?;

    Ok(Json(ScriptResponse {
        success: true,
        script,
    }))
}
