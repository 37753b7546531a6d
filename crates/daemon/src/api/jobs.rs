use axum::{
    extract::{Path, State},
    response::Json,
    routing::get,
    Router,
};

use super::{parse_job_id, AppState};
use crate::error::{ApiError, ApiResult};
use crate::jobs::JobSnapshot;

pub fn router() -> Router<AppState> {
    Router::new().route("/status/:job_id", get(get_status))
}

async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let id = parse_job_id(&job_id)?;
    state
        .jobs
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Job not found"))
}

#[cfg(test)]
mod tests {
    use crate::api::testing::{app, get, multipart_request, response_json, state_in, Part};
    use axum::http::StatusCode;
    use tower::ServiceExt;

    #[tokio::test]
    async fn malformed_ids_are_rejected_before_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(state_in(dir.path()));

        for bad in ["abc", "20240101_120000_DEADBEEF", "..%2F..%2Fetc"] {
            let response = app
                .clone()
                .oneshot(get(&format!("/api/status/{}", bad)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{bad}");
            assert_eq!(response_json(response).await["error"], "Invalid job ID");
        }
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(state_in(dir.path()))
            .oneshot(get("/api/status/20240101_120000_deadbeef"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response_json(response).await["error"], "Job not found");
    }

    #[tokio::test]
    async fn submitted_job_reaches_done() {
        let dir = tempfile::tempdir().unwrap();
        let app = app(state_in(dir.path()));

        let parts = vec![
            Part::file("photos", "one.jpg", b"img"),
            Part::file("photos", "two.jpg", b"img"),
            Part::file("photos", "three.webp", b"img"),
            Part::text(
                "script",
                "The morning starts slow on the coast, fishing boats drifting in while gulls \
                 circle overhead and the town wakes up to the smell of fresh bread and coffee today.",
            ),
        ];
        let response = app
            .clone()
            .oneshot(multipart_request("/api/generate", &parts))
            .await
            .unwrap();
        let job_id = response_json(response).await["job_id"]
            .as_str()
            .unwrap()
            .to_string();

        let mut status = serde_json::Value::Null;
        for _ in 0..200 {
            let response = app
                .clone()
                .oneshot(get(&format!("/api/status/{}", job_id)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            status = response_json(response).await;
            if status["status"] != "processing" {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        assert_eq!(status["status"], "done", "{status}");
        assert_eq!(status["progress"], 100);
        assert_eq!(status["result"]["num_images"], 3);
        assert_eq!(status["result"]["video_url"], format!("/api/stream/{}", job_id));
        assert!(status["result"]["video_size_mb"].as_f64().unwrap() > 0.0);
        assert_eq!(status["error"], serde_json::Value::Null);
    }
}
