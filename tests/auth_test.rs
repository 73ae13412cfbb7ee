//! Integration tests for stream token handling at the HTTP boundary.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use common::{pattern, TestHarness, CHAT};
use http_body_util::BodyExt;
use reelstream::server::auth::{StreamClaims, TokenAuthority};
use reelstream_common::{ChatId, ContentReference, FileLocation, MediaType, MessageId};
use reelstream_db::models::NewCatalogFile;
use reelstream_db::queries::catalog_files;
use tower::ServiceExt;

fn movie_claims(content_id: &str, quality_index: u32) -> StreamClaims {
    StreamClaims::for_reference(
        &ContentReference {
            content_id: content_id.to_string(),
            file_reference_id: None,
            media_type: MediaType::Movie,
            quality_index,
            season_number: None,
            episode_number: None,
        },
        300,
    )
}

async fn get(h: &TestHarness, uri: &str) -> (StatusCode, bytes::Bytes) {
    let resp = h
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    (status, resp.into_body().collect().await.unwrap().to_bytes())
}

#[tokio::test]
async fn token_from_other_secret_is_rejected() {
    let h = TestHarness::new();
    h.add_movie("tt1", 1, "AgADmovie1", pattern(64));

    let forged = TokenAuthority::new("someone-else")
        .issue(&movie_claims("tt1", 0))
        .unwrap();
    let (status, _) = get(&h, &format!("/stream/tt1?token={forged}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = get(&h, &format!("/stream/tt1?token={}", h.movie_token("tt1"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 64);
}

#[tokio::test]
async fn unsigned_token_is_rejected() {
    let h = TestHarness::new();
    h.add_movie("tt1", 1, "AgADmovie1", pattern(64));

    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&movie_claims("tt1", 0)).unwrap());
    let token = format!("{header}.{payload}.");

    let (status, _) = get(&h, &format!("/stream/tt1?token={token}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn claims_override_query_selection() {
    let h = TestHarness::new();
    h.add_movie("tt1", 1, "AgADmovie1", pattern(64));

    // A second quality of the same movie
    h.source.insert(
        FileLocation::new(CHAT, 2i64),
        "AgADmovie2",
        Some("video/mp4"),
        None,
        pattern(128),
    );
    catalog_files::upsert_catalog_file(
        &h.conn(),
        &NewCatalogFile {
            content_id: "tt1".to_string(),
            media_type: MediaType::Movie,
            season_number: None,
            episode_number: None,
            quality_index: 1,
            quality_label: Some("720p".to_string()),
            chat_id: ChatId::new(CHAT),
            msg_id: MessageId::new(2),
            file_hash: Some("AgADmo".to_string()),
            size_bytes: None,
            file_name: None,
        },
    )
    .unwrap();

    let token = h.token(&movie_claims("tt1", 1));
    let (status, body) = get(&h, &format!("/stream/tt1?token={token}&quality_index=0")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.len(), 128);
}

#[tokio::test]
async fn server_without_secret_rejects_everything() {
    let mut config = common::test_config();
    config.stream.token_secret = String::new();
    let h = TestHarness::with_config(config);
    h.add_movie("tt1", 1, "AgADmovie1", pattern(64));

    let (status, _) = get(&h, &format!("/stream/tt1?token={}", h.movie_token("tt1"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
