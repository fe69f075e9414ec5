use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};
use crate::storage::StorageClient;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;
/// URL prefix the images directory is served under.
pub const PUBLIC_PREFIX: &str = "/images";

pub(crate) const INVALID_FORMAT_MESSAGE: &str =
    "Invalid file format. Only JPEG, PNG, and GIF are allowed.";
pub(crate) const TOO_LARGE_MESSAGE: &str = "File too large. Maximum size is 5 MB.";

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];
const ALLOWED_MIME_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/gif"];

pub struct UploadItem {
    pub file_name: String,
    pub content_type: String,
    pub body: Bytes,
}

/// Extension of the client-supplied name including the dot, case preserved.
fn extension_of(file_name: &str) -> Option<&str> {
    let base = Path::new(file_name).file_name()?.to_str()?;
    let ext = Path::new(base).extension()?.to_str()?;
    Some(&base[base.len() - ext.len() - 1..])
}

fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Both the extension and the declared content type must be on the allowlist.
pub fn check_image_type(file_name: &str, content_type: &str) -> AppResult<()> {
    let ext_ok = extension_of(file_name)
        .map(|e| e[1..].to_ascii_lowercase())
        .is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()));
    let mime_ok = ALLOWED_MIME_TYPES.contains(&essence(content_type).as_str());

    if ext_ok && mime_ok {
        Ok(())
    } else {
        warn!(file_name, content_type, "rejected upload type");
        Err(AppError::upload(INVALID_FORMAT_MESSAGE))
    }
}

pub fn stored_file_name(now: OffsetDateTime, original: &str) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    format!("{}{}", millis, extension_of(original).unwrap_or(""))
}

/// Validates and writes the image, returning its public path.
pub async fn store_image(storage: &dyn StorageClient, item: UploadItem) -> AppResult<String> {
    check_image_type(&item.file_name, &item.content_type)?;
    if item.body.len() > MAX_IMAGE_BYTES {
        warn!(bytes = item.body.len(), "rejected oversized upload");
        return Err(AppError::upload(TOO_LARGE_MESSAGE));
    }

    let key = stored_file_name(OffsetDateTime::now_utc(), &item.file_name);
    let bytes = item.body.len();
    storage
        .put_object(&key, item.body, &essence(&item.content_type))
        .await
        .with_context(|| format!("store image {}", key))?;

    info!(%key, bytes, "image uploaded");
    Ok(format!("{}/{}", PUBLIC_PREFIX, key))
}
