use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::llm::ScriptError;
use crate::media::MediaError;
use crate::tts::TtsError;

pub type ApiResult<T> = Result<T, ApiError>;

/// Request-level failures, returned synchronously before (or instead of) any job.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("{0}")]
    Upstream(String),

    /// A server-side failure whose message is safe to show.
    #[error("{0}")]
    Failed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_job_id() -> Self {
        Self::BadRequest("Invalid job ID".to_string())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Failed(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ApiError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<engine::render::UnknownPlatform> for ApiError {
    fn from(err: engine::render::UnknownPlatform) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ScriptError> for ApiError {
    fn from(err: ScriptError) -> Self {
        match err {
            ScriptError::MissingKey => ApiError::BadRequest(err.to_string()),
            ScriptError::RateLimited => ApiError::RateLimited(err.to_string()),
            ScriptError::Failed(_) => ApiError::Upstream(err.to_string()),
        }
    }
}

/// Why a job ended in `error`. `Display` is the full diagnostic for logs;
/// [`JobError::user_message`] is what the client sees.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream rejected credentials: {0}")]
    UpstreamAuth(String),

    #[error("Upstream quota exceeded: {0}")]
    UpstreamQuota(String),

    #[error("Engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("{stage} failed: {detail}")]
    Failed { stage: &'static str, detail: String },

    #[error("Job cancelled")]
    Cancelled,
}

impl JobError {
    pub fn user_message(&self) -> String {
        match self {
            JobError::Validation(msg) => msg.clone(),
            JobError::UpstreamAuth(_) => "Speech engine rejected the API key.".to_string(),
            JobError::UpstreamQuota(_) => {
                "Speech engine quota exceeded. Please try again later.".to_string()
            }
            JobError::EngineUnavailable(remediation) => remediation.clone(),
            JobError::Timeout { stage, .. } => format!("{} timed out.", stage),
            JobError::Failed { stage, .. } => format!("{} failed.", stage),
            JobError::Cancelled => "Job cancelled".to_string(),
        }
    }
}

impl From<TtsError> for JobError {
    fn from(err: TtsError) -> Self {
        match err {
            TtsError::InvalidKey => JobError::UpstreamAuth(err.to_string()),
            TtsError::QuotaExceeded => JobError::UpstreamQuota(err.to_string()),
            TtsError::EngineUnavailable(detail) => JobError::EngineUnavailable(format!(
                "Speech synthesis is unavailable ({}).",
                detail
            )),
            TtsError::InvalidInput(msg) => JobError::Validation(msg),
            TtsError::Request(detail) => JobError::Failed {
                stage: "Narration",
                detail,
            },
            TtsError::Io(e) => JobError::Failed {
                stage: "Narration",
                detail: e.to_string(),
            },
        }
    }
}

impl From<MediaError> for JobError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::EngineUnavailable { .. } => JobError::EngineUnavailable(
                "FFmpeg is not installed. Please install FFmpeg and add it to your PATH."
                    .to_string(),
            ),
            MediaError::Timeout { budget, .. } => JobError::Timeout {
                stage: "Video generation",
                secs: budget.as_secs(),
            },
            MediaError::Plan(e) => JobError::Validation(e.to_string()),
            other => JobError::Failed {
                stage: "Video generation",
                detail: other.to_string(),
            },
        }
    }
}
