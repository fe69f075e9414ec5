use axum::{
    extract::{
        multipart::{Field, MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, State,
    },
    http::StatusCode,
    routing::post,
    Json, Router,
};
use bytes::BytesMut;
use serde::Serialize;
use tracing::{instrument, warn};

use super::services::{
    check_image_type, store_image, UploadItem, MAX_IMAGE_BYTES, TOO_LARGE_MESSAGE,
};
use crate::{
    error::{AppError, AppResult},
    state::AppState,
};

const FIELD_NAME: &str = "image";
/// Room for multipart headers and boundaries around a maximum-size file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadImageResponse {
    pub message: String,
    pub file_path: String,
}

pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/user/uploadImage", post(upload_image))
        .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + MULTIPART_OVERHEAD))
}

/// POST /user/uploadImage, multipart with a single file field `image`.
#[instrument(skip(state, mp))]
pub async fn upload_image(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<UploadImageResponse>)> {
    let mut mp = mp.map_err(|e| {
        warn!(error = %e, "upload without multipart body");
        AppError::upload("No file uploaded")
    })?;

    let mut image: Option<UploadItem> = None;
    while let Some(field) = mp.next_field().await.map_err(multipart_error)? {
        // text parts are ignored; any file part other than the first `image` is refused
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if field.name() != Some(FIELD_NAME) || image.is_some() {
            warn!(field = ?field.name(), "unexpected file field");
            return Err(AppError::upload("Unexpected field"));
        }

        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        check_image_type(&file_name, &content_type)?;

        let body = read_limited(field).await?;
        image = Some(UploadItem {
            file_name,
            content_type,
            body,
        });
    }

    let Some(item) = image else {
        return Err(AppError::upload("No file uploaded"));
    };

    let file_path = store_image(state.storage.as_ref(), item).await?;
    Ok((
        StatusCode::OK,
        Json(UploadImageResponse {
            message: "Image uploaded successfully".into(),
            file_path,
        }),
    ))
}

/// Reads a field, failing as soon as it grows past the size cap.
async fn read_limited(mut field: Field<'_>) -> AppResult<bytes::Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
        if buf.len() + chunk.len() > MAX_IMAGE_BYTES {
            warn!("upload exceeds size limit");
            return Err(AppError::upload(TOO_LARGE_MESSAGE));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::upload(TOO_LARGE_MESSAGE)
    } else {
        AppError::upload(e.body_text())
    }
}
