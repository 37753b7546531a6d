use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use futures::StreamExt;
use std::path::Path as FsPath;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio_util::codec::{BytesCodec, FramedRead};

use super::{parse_job_id, AppState};
use crate::error::{ApiError, ApiResult};
use crate::jobs::{JobId, JobStatus};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/stream/:job_id", get(stream_video))
        .route("/download/:job_id", get(download_video))
        .route("/thumbnail/:job_id", get(get_thumbnail))
}

/// Only a finished job exposes its files. A job that is still rendering or has
/// failed may have a partial file on disk, which is never served. Without a
/// record (already swept) the file on disk decides.
pub(crate) fn ensure_servable(state: &AppState, id: &JobId, missing: &str) -> ApiResult<()> {
    match state.jobs.get(id) {
        Some(job) if job.status != JobStatus::Done => Err(ApiError::not_found(missing)),
        _ => Ok(()),
    }
}

async fn stream_video(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let id = parse_job_id(&job_id)?;
    ensure_servable(&state, &id, "Video not found")?;
    let path = state.jobs.workspace(&id).reel();
    let mut response = serve_file(&path, "video/mp4", &headers)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=3600"),
    );
    Ok(response)
}

async fn download_video(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_job_id(&job_id)?;
    ensure_servable(&state, &id, "Video not found")?;
    let path = state.jobs.workspace(&id).reel();
    let response = serve_file(&path, "video/mp4", &HeaderMap::new())
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(attachment(response, &format!("reel_{}.mp4", id)))
}

async fn get_thumbnail(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_job_id(&job_id)?;
    ensure_servable(&state, &id, "Thumbnail not found")?;
    let path = state.jobs.workspace(&id).thumbnail();
    serve_file(&path, "image/jpeg", &HeaderMap::new())
        .await?
        .ok_or_else(|| ApiError::not_found("Thumbnail not found"))
}

pub(crate) fn attachment(mut response: Response, file_name: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name)) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }
    response
}

/// Streams `path` in bounded chunks, honouring a single `Range` request.
/// `Ok(None)` when the file does not exist.
pub(crate) async fn serve_file(
    path: &FsPath,
    content_type: &'static str,
    headers: &HeaderMap,
) -> ApiResult<Option<Response>> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Ok(None),
    };
    let file_size = metadata.len();

    if file_size == 0 {
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .map(Some)
            .map_err(|e| ApiError::internal(e.to_string()));
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| parse_range(value, file_size));
    let (start, end, status) = match range {
        Some((start, end)) => (start, end, StatusCode::PARTIAL_CONTENT),
        None => (0, file_size - 1, StatusCode::OK),
    };
    let content_length = end - start + 1;

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;

    let stream = FramedRead::new(file.take(content_length), BytesCodec::new())
        .map(|chunk| chunk.map(|bytes| bytes.freeze()));

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_LENGTH, content_length.to_string());
    if status == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, file_size),
        );
    }

    builder
        .body(Body::from_stream(stream))
        .map(Some)
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// `bytes=start-end`, `bytes=start-` or `bytes=-suffix`. Returns an inclusive range,
/// or `None` for anything unsatisfiable or multi-range.
fn parse_range(value: &str, file_size: u64) -> Option<(u64, u64)> {
    let spec = value.strip_prefix("bytes=")?.trim();
    let (start, end) = spec.split_once('-')?;
    let (start, end) = (start.trim(), end.trim());
    if file_size == 0 || end.contains(',') {
        return None;
    }

    let (start, end) = match (start.is_empty(), end.is_empty()) {
        (true, true) => return None,
        (true, false) => {
            let suffix: u64 = end.parse().ok()?;
            if suffix == 0 {
                return None;
            }
            (file_size.saturating_sub(suffix), file_size - 1)
        }
        (false, true) => (start.parse().ok()?, file_size - 1),
        (false, false) => {
            let end: u64 = end.parse().ok()?;
            (start.parse().ok()?, end.min(file_size - 1))
        }
    };

    (start <= end && start < file_size).then_some((start, end))
}
