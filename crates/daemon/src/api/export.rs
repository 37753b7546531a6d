use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use engine::render::ExportPlatform;
use tracing::error;

use super::artifacts::{attachment, ensure_servable, serve_file};
use super::{parse_job_id, AppState};
use crate::error::{ApiError, ApiResult};
use crate::media::MediaError;

pub fn router() -> Router<AppState> {
    Router::new().route("/export/:job_id/:platform", get(export))
}

async fn export(
    State(state): State<AppState>,
    Path((job_id, platform)): Path<(String, String)>,
) -> ApiResult<Response> {
    let id = parse_job_id(&job_id)?;
    let platform = ExportPlatform::parse(&platform)?;
    ensure_servable(&state, &id, "Video not found")?;

    let workspace = state.jobs.workspace(&id);
    if !tokio::fs::try_exists(workspace.reel()).await.unwrap_or(false) {
        return Err(ApiError::not_found("Video not found"));
    }

    let exported = state
        .composer
        .export(platform, &workspace)
        .await
        .map_err(|e| match &e {
            MediaError::Failed { .. } => {
                error!(job_id = %id, platform = platform.key(), error = %e, "Export encoding failed");
                ApiError::Failed("Export encoding failed".to_string())
            }
            other => ApiError::internal(other.to_string()),
        })?;

    let response = serve_file(&exported, "video/mp4", &HeaderMap::new())
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(attachment(
        response,
        &format!("reel_{}_{}.mp4", platform.key(), id),
    ))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{app, get, response_json, state_in, state_with};
    use crate::jobs::JobId;
    use crate::media::testing::FakeTranscoder;
    use axum::http::{header, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    const JOB: &str = "20240101_120000_feedf00d";

    #[tokio::test]
    async fn unknown_platform_lists_choices() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state_in(dir.path()))
            .oneshot(get(&format!("/api/export/{}/myspace", JOB)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response_json(response).await["error"],
            "Unknown platform. Supported: instagram, tiktok, youtube"
        );
    }

    #[tokio::test]
    async fn malformed_job_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state_in(dir.path()))
            .oneshot(get("/api/export/not-a-job/tiktok"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response_json(response).await["error"], "Invalid job ID");
    }

    #[tokio::test]
    async fn export_is_encoded_once() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::default());
        let state = state_with(dir.path(), transcoder.clone());
        let id = JobId::parse(JOB).unwrap();
        let workspace = state.jobs.workspace(&id);
        workspace.create().await.unwrap();
        tokio::fs::write(workspace.reel(), b"reel").await.unwrap();
        let app = app(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(get(&format!("/api/export/{}/tiktok", JOB)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(
                response.headers()[header::CONTENT_DISPOSITION],
                format!("attachment; filename=\"reel_tiktok_{}.mp4\"", JOB).as_str()
            );
        }
        assert_eq!(transcoder.calls().len(), 1);
    }

    #[tokio::test]
    async fn failed_encode_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let transcoder = Arc::new(FakeTranscoder::failing_on("force_original_aspect_ratio"));
        let state = state_with(dir.path(), transcoder);
        let id = JobId::parse(JOB).unwrap();
        let workspace = state.jobs.workspace(&id);
        workspace.create().await.unwrap();
        tokio::fs::write(workspace.reel(), b"reel").await.unwrap();

        let response = app(state)
            .oneshot(get(&format!("/api/export/{}/youtube", JOB)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response_json(response).await["error"], "Export encoding failed");
    }

    #[tokio::test]
    async fn missing_reel_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state_in(dir.path()))
            .oneshot(get(&format!("/api/export/{}/instagram", JOB)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
