use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;
use std::collections::HashMap;

use crate::error::{ApiError, ApiResult};
use crate::jobs::UploadedImage;

pub const ALLOWED_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "webp", "bmp", "gif"];

const PHOTO_FIELDS: [&str; 2] = ["photos", "photos[]"];

/// Lowercased extension when the file name ends in an allowed image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

fn upload_error(max_upload_bytes: usize) -> impl Fn(MultipartError) -> ApiError {
    move |err| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge(format!(
                "Upload too large. Max {} MB.",
                max_upload_bytes / (1024 * 1024)
            ))
        } else {
            ApiError::bad_request(err.body_text())
        }
    }
}

/// A multipart upload: photo parts (already filtered to allowed types) plus text fields.
#[derive(Debug, Default)]
pub struct UploadForm {
    /// Whether the request carried any photo part at all, valid or not.
    pub has_photo_parts: bool,
    pub photos: Vec<UploadedImage>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    pub async fn read(mut multipart: Multipart, max_upload_bytes: usize) -> ApiResult<Self> {
        let on_error = upload_error(max_upload_bytes);
        let mut form = UploadForm::default();

        while let Some(field) = multipart.next_field().await.map_err(&on_error)? {
            let name = field.name().unwrap_or_default().to_string();
            if PHOTO_FIELDS.contains(&name.as_str()) {
                form.has_photo_parts = true;
                let extension = field.file_name().and_then(image_extension);
                let data = field.bytes().await.map_err(&on_error)?;
                if let Some(extension) = extension {
                    form.photos.push(UploadedImage { extension, data });
                }
            } else {
                let value = field.text().await.map_err(&on_error)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    /// Trimmed field value; blank counts as absent.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.text(name).unwrap_or(default)
    }

    pub fn number(&self, name: &str) -> ApiResult<Option<f64>> {
        match self.text(name) {
            None => Ok(None),
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| ApiError::validation(format!("Invalid value for {}", name))),
        }
    }

    #[cfg(test)]
    pub fn with_fields(photos: Vec<UploadedImage>, fields: &[(&str, &str)]) -> Self {
        UploadForm {
            has_photo_parts: !photos.is_empty(),
            photos,
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}
