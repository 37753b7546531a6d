use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;

use crate::config::DaemonConfig;
use crate::error::{ApiError, ApiResult};
use crate::jobs::{JobId, JobManager};
use crate::llm::ScriptGenerator;
use crate::media::{MusicLibrary, VideoComposer};
use crate::rate_limit::SubmissionGate;
use crate::tts::{GoogleTts, VoiceDirectory};

pub mod artifacts;
pub mod catalog;
pub mod export;
mod form;
pub mod generate;
pub mod jobs;
pub mod script;

/// Shared handles for every route.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<DaemonConfig>,
    pub jobs: Arc<JobManager>,
    pub composer: Arc<VideoComposer>,
    pub gate: Arc<SubmissionGate>,
    pub voices: Arc<VoiceDirectory>,
    pub preview: Arc<GoogleTts>,
    pub scripts: Arc<ScriptGenerator>,
    pub music: MusicLibrary,
}

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    service: &'static str,
    version: &'static str,
    timestamp: String,
}

/// Mounted at `/health` and `/api/health`.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.limits.max_upload_bytes;
    Router::new()
        .route("/health", get(health))
        .merge(generate::router())
        .merge(jobs::router())
        .merge(artifacts::router())
        .merge(export::router())
        .merge(catalog::router())
        .merge(script::router())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Every job-scoped route goes through here before touching the registry or disk.
pub(crate) fn parse_job_id(raw: &str) -> ApiResult<JobId> {
    JobId::parse(raw).ok_or_else(ApiError::invalid_job_id)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::jobs::processor::testing::manager_with;
    use crate::media::testing::FakeTranscoder;
    use crate::media::Transcoder;
    use crate::tts::testing::FakeSpeech;
    use crate::tts::voices::{PremiumVoiceSource, VoiceInfo};
    use crate::tts::{TtsEngine, TtsError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{header, Request};
    use axum::response::Response;
    use std::net::SocketAddr;
    use std::path::Path;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    struct NoPremiumVoices;

    #[async_trait]
    impl PremiumVoiceSource for NoPremiumVoices {
        async fn list_voices(&self, _api_key: &str) -> Result<Vec<VoiceInfo>, TtsError> {
            Err(TtsError::EngineUnavailable("offline".to_string()))
        }
    }

    pub fn state_with(dir: &Path, transcoder: Arc<dyn Transcoder>) -> AppState {
        let config = DaemonConfig {
            output_dir: dir.to_path_buf(),
            music_dir: dir.join("music"),
            rate_limit_interval: Duration::from_secs(10),
            ..DaemonConfig::default()
        };
        let jobs = manager_with(
            dir,
            transcoder.clone(),
            Arc::new(FakeSpeech::ok(TtsEngine::GoogleTts)),
            CancellationToken::new(),
        );
        let composer = Arc::new(VideoComposer::new(
            transcoder,
            config.fps,
            config.timeouts.clone(),
        ));
        AppState {
            gate: Arc::new(SubmissionGate::new(config.rate_limit_interval)),
            music: MusicLibrary::new(config.music_dir.clone()),
            config: Arc::new(config),
            jobs,
            composer,
            voices: Arc::new(VoiceDirectory::new(Arc::new(NoPremiumVoices))),
            preview: Arc::new(GoogleTts::new(reqwest::Client::new())),
            scripts: Arc::new(ScriptGenerator::new(reqwest::Client::new(), None)),
        }
    }

    pub fn state_in(dir: &Path) -> AppState {
        state_with(dir, Arc::new(FakeTranscoder::default()))
    }

    /// The full `/api` router as the binary mounts it, with a fixed peer address.
    pub fn app(state: AppState) -> Router {
        Router::new()
            .nest("/api", router(state))
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
    }

    pub enum Part {
        Text(&'static str, String),
        File(&'static str, String, Vec<u8>),
    }

    impl Part {
        pub fn text(name: &'static str, value: &str) -> Self {
            Part::Text(name, value.to_string())
        }

        pub fn file(name: &'static str, file_name: &str, data: &[u8]) -> Self {
            Part::File(name, file_name.to_string(), data.to_vec())
        }
    }

    const BOUNDARY: &str = "reel-test-boundary";

    pub fn multipart_request(uri: &str, parts: &[Part]) -> Request<Body> {
        let mut body = Vec::new();
        for part in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            match part {
                Part::Text(name, value) => {
                    body.extend_from_slice(
                        format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                            .as_bytes(),
                    );
                    body.extend_from_slice(value.as_bytes());
                }
                Part::File(name, file_name, data) => {
                    body.extend_from_slice(
                        format!(
                            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n\
                             Content-Type: application/octet-stream\r\n\r\n",
                            name, file_name
                        )
                        .as_bytes(),
                    );
                    body.extend_from_slice(data);
                }
            }
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    pub fn post_json(uri: &str, payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    pub async fn response_bytes(response: Response) -> bytes::Bytes {
        axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap()
    }

    pub async fn response_json(response: Response) -> serde_json::Value {
        serde_json::from_slice(&response_bytes(response).await).unwrap()
    }
}
