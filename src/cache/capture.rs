//! Response capture for the site cache.
//!
//! The renderer writes a status, content type and body as usual; the cache
//! middleware buffers the finished response and hands it to a
//! [`ResponseObserver`] before sending it on.

use axum::{
    body::Body,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use thiserror::Error;

pub trait ResponseObserver {
    fn observe(&self, status: StatusCode, content_type: &str, body: &Bytes);
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to buffer response body: {0}")]
    Buffer(String),
}

/// Whether the cache may keep a copy of `response`.
///
/// Only plain `200 OK` responses qualify; a response that sets a cookie or
/// streams events is never shared between visitors.
pub fn is_storable(response: &Response) -> bool {
    if response.status() != StatusCode::OK {
        return false;
    }

    if response.headers().contains_key(header::SET_COOKIE) {
        return false;
    }

    !response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("text/event-stream"))
}

/// Buffer `response`, report it to `observer` when it fits in `max_body_bytes`,
/// and return an equivalent response to send.
///
/// A body whose declared length already exceeds the limit is passed through
/// without buffering.
pub async fn capture_response<O: ResponseObserver>(
    response: Response,
    max_body_bytes: usize,
    observer: &O,
) -> Result<Response, (Response, CaptureError)> {
    use axum::body::HttpBody as _;

    let declared = response.body().size_hint().exact();
    if declared.is_some_and(|len| len > max_body_bytes as u64) {
        return Ok(response);
    }

    let (parts, body) = response.into_parts();
    let bytes = match BodyExt::collect(body).await {
        Ok(collected) => collected.to_bytes(),
        Err(error) => {
            let rebuilt = StatusCode::INTERNAL_SERVER_ERROR.into_response();
            return Err((rebuilt, CaptureError::Buffer(error.to_string())));
        }
    };

    if bytes.len() <= max_body_bytes {
        let content_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream");
        observer.observe(parts.status, content_type, &bytes);
    }

    Ok(Response::from_parts(parts, Body::from(bytes)))
}
