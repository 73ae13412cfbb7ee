//! Bundle listing route.
//!
//! `GET /api/v1/show/:sid/bundles` lists a show's season packs ordered by
//! season. Only link-safe fields are returned; upstream chat and message ids
//! stay private.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use reelstream_db::models::BundleRecord;
use serde::Serialize;

use super::error::AppError;
use super::request_id::RequestId;
use super::AppContext;

/// Public view of a bundle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleSummary {
    /// Short hash when known, else the long file id. Either streams.
    pub id: String,
    pub title: String,
    pub season: Option<u32>,
    pub episode_range: Option<String>,
    pub size_bytes: Option<u64>,
    pub file_name: Option<String>,
    /// Whether the bundle can be identity-checked before streaming.
    pub verified: bool,
}

impl From<BundleRecord> for BundleSummary {
    fn from(bundle: BundleRecord) -> Self {
        let hash = bundle.file_hash.filter(|h| !h.is_empty());
        Self {
            verified: hash.is_some(),
            id: hash.unwrap_or(bundle.file_id),
            title: bundle.title,
            season: bundle.season,
            episode_range: bundle.episode_range,
            size_bytes: bundle.size_bytes,
            file_name: bundle.file_name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BundleList {
    pub show_id: i64,
    pub bundles: Vec<BundleSummary>,
}

pub fn bundle_routes() -> Router<AppContext> {
    Router::new().route("/api/v1/show/:sid/bundles", get(list_show_bundles))
}

async fn list_show_bundles(
    State(ctx): State<AppContext>,
    Path(show_id): Path<i64>,
    request_id: Option<Extension<RequestId>>,
) -> Response {
    match ctx.catalog.bundles_for_show(show_id).await {
        Ok(bundles) => Json(BundleList {
            show_id,
            bundles: bundles.into_iter().map(BundleSummary::from).collect(),
        })
        .into_response(),
        Err(e) => {
            let mut error = AppError::new(e);
            if let Some(Extension(RequestId(rid))) = request_id {
                error = error.with_request_id(rid);
            }
            error.into_response()
        }
    }
}
