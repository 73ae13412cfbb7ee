//! Error-to-HTTP response conversion.
//!
//! Clients only ever see [`Error::public_message`]; the full error goes to
//! the log.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reelstream_common::Error;
use serde_json::json;

/// Seconds a client should wait before retrying a 503.
const RETRY_AFTER_SECS: &str = "5";

/// Wrapper so we can implement `IntoResponse` for the common error type.
#[derive(Debug)]
pub struct AppError {
    inner: Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn inner(&self) -> &Error {
        &self.inner
    }
}

impl From<Error> for AppError {
    fn from(e: Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self.inner {
            Error::IntegrityViolation { expected, actual } => {
                tracing::error!(
                    integrity = true,
                    expected = %expected,
                    actual = %actual,
                    request_id = ?self.request_id,
                    "Content identity mismatch; refusing to stream"
                );
            }
            Error::RangeNotSatisfiable { .. } => {}
            e if e.is_retryable() => {
                tracing::warn!(status = %status, error = %e, "Upstream unavailable");
            }
            e if status.is_server_error() => {
                tracing::error!(status = %status, error = %e, "Server error in handler");
            }
            e => {
                tracing::debug!(status = %status, error = %e, "Request rejected");
            }
        }

        let body = json!({
            "error": self.inner.public_message(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        let mut response = (status, axum::Json(body)).into_response();
        let headers = response.headers_mut();

        if let Error::RangeNotSatisfiable { total_size } = &self.inner {
            if let Ok(value) = HeaderValue::from_str(&format!("bytes */{}", total_size)) {
                headers.insert(header::CONTENT_RANGE, value);
            }
        }
        if self.inner.is_retryable() {
            headers.insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn not_found_produces_404() {
        let response = AppError::new(Error::not_found("bundle x")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn range_error_carries_total_size() {
        let response =
            AppError::new(Error::RangeNotSatisfiable { total_size: 1234 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get(header::CONTENT_RANGE).unwrap(),
            "bytes */1234"
        );
    }

    #[test]
    fn unavailable_sets_retry_after() {
        let response = AppError::new(Error::NoCapacity).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn auth_reason_is_not_leaked() {
        let response = AppError::new(Error::auth("bad signature"))
            .with_request_id("req-1")
            .into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(body["request_id"], "req-1");
        assert!(!body.to_string().contains("signature"));
    }

    #[tokio::test]
    async fn integrity_detail_is_not_leaked() {
        let response = AppError::new(Error::IntegrityViolation {
            expected: "abc123".to_string(),
            actual: "xyz999".to_string(),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert!(!body.to_string().contains("abc123"));
        assert!(!body.to_string().contains("xyz999"));
    }
}
