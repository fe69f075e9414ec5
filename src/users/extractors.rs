use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderValue},
    Form,
};
use serde::de::DeserializeOwned;

use crate::error::AppError;

/// Request body accepted either as JSON or as an urlencoded form.
///
/// A body with any other (or no) content type, or an empty JSON body,
/// deserializes to `T::default()` so that missing fields are reported by the
/// handler's own presence checks.
pub struct Payload<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default,
{
    type Rejection = AppError;

    async fn from_request(mut req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let kind = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(body_kind)
            .unwrap_or(BodyKind::Other);

        match kind {
            BodyKind::Other => return Ok(Payload(T::default())),
            BodyKind::Json => {}
            BodyKind::Form => {
                // axum's form check is case-sensitive
                req.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("application/x-www-form-urlencoded"),
                );
                let Form(value) = Form::<T>::from_request(req, state)
                    .await
                    .map_err(|e| AppError::validation(e.body_text()))?;
                return Ok(Payload(value));
            }
        }

        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::validation(e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload(T::default()));
        }
        let value = serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Invalid JSON body: {e}")))?;
        Ok(Payload(value))
    }
}

#[derive(Debug, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Other,
}

fn body_kind(content_type: &str) -> BodyKind {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/json" => BodyKind::Json,
        "application/x-www-form-urlencoded" => BodyKind::Form,
        _ => BodyKind::Other,
    }
}
