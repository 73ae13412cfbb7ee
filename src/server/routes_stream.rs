//! Streaming routes.
//!
//! - `GET /stream/:id` - token-authorized range streaming
//! - `GET /api/v1/dl/:id` - legacy alias with identical behavior

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use reelstream_common::{Error, Result};
use serde::Deserialize;

use super::auth::RequestedSelection;
use super::error::AppError;
use super::request_id::RequestId;
use super::AppContext;
use crate::streaming::{PreparedStream, StreamSession};

/// Query string of a stream request.
///
/// Numbers are taken as strings so a bad value yields a JSON 400 like every
/// other error.
#[derive(Debug, Default, Deserialize)]
pub struct StreamQuery {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub quality_index: Option<String>,
    #[serde(default)]
    pub season_number: Option<String>,
    #[serde(default)]
    pub episode_number: Option<String>,
}

impl StreamQuery {
    fn selection(&self) -> Result<RequestedSelection> {
        Ok(RequestedSelection {
            media_type: self.media_type.clone().filter(|m| !m.is_empty()),
            quality_index: parse_number("quality_index", self.quality_index.as_deref())?,
            season_number: parse_number("season_number", self.season_number.as_deref())?,
            episode_number: parse_number("episode_number", self.episode_number.as_deref())?,
        })
    }
}

fn parse_number(name: &str, value: Option<&str>) -> Result<Option<u32>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid_input(format!("{} must be a non-negative integer", name))),
    }
}

pub fn stream_routes() -> Router<AppContext> {
    Router::new()
        .route("/stream/:id", get(stream))
        .route("/api/v1/dl/:id", get(stream))
}

async fn stream(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(query): Query<StreamQuery>,
    request_id: Option<Extension<RequestId>>,
    headers: HeaderMap,
) -> Response {
    match serve_stream(&ctx, &id, &query, &headers).await {
        Ok(response) => response,
        Err(e) => {
            let mut error = AppError::new(e);
            if let Some(Extension(RequestId(rid))) = request_id {
                error = error.with_request_id(rid);
            }
            error.into_response()
        }
    }
}

async fn serve_stream(
    ctx: &AppContext,
    id: &str,
    query: &StreamQuery,
    headers: &HeaderMap,
) -> Result<Response> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::auth("missing token"))?;
    let selection = query.selection()?;
    let reference = ctx.tokens.authorize(token, id, &selection)?;

    // A non-ASCII header can never parse; it fails at planning with the real size
    let range_header = headers
        .get(header::RANGE)
        .map(|value| value.to_str().unwrap_or("invalid"));

    tracing::debug!(
        id,
        media_type = %reference.media_type,
        range = ?range_header,
        "Stream request"
    );

    let session = StreamSession::new(&ctx.pool, ctx.catalog.as_ref(), &ctx.settings, reference);
    let prepared = session.prepare(range_header).await?;
    build_response(prepared)
}

fn build_response(prepared: PreparedStream) -> Result<Response> {
    let status = if prepared.range.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, prepared.content_type.as_str())
        .header(header::CONTENT_LENGTH, prepared.range.content_length())
        .header(header::ACCEPT_RANGES, "bytes")
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&prepared.file_name),
        );
    if let Some(window) = prepared.range.window() {
        builder = builder.header(header::CONTENT_RANGE, window.content_range());
    }

    builder
        .body(Body::from_stream(prepared.body))
        .map_err(|e| Error::internal(format!("failed to build stream response: {}", e)))
}

/// `attachment` disposition with an ASCII `filename` and, for non-ASCII
/// names, an RFC 5987 `filename*`.
fn content_disposition(name: &str) -> String {
    let ascii: String = name
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if ascii == name {
        return format!("attachment; filename=\"{}\"", ascii);
    }

    let encoded: String = name
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect();
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        ascii, encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("q", None).unwrap(), None);
        assert_eq!(parse_number("q", Some("")).unwrap(), None);
        assert_eq!(parse_number("q", Some("3")).unwrap(), Some(3));
        assert!(parse_number("q", Some("-1")).is_err());
    }

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("movie.mkv"),
            "attachment; filename=\"movie.mkv\""
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition("é.mp4");
        assert_eq!(
            value,
            "attachment; filename=\"_.mp4\"; filename*=UTF-8''%C3%A9.mp4"
        );
    }
}
