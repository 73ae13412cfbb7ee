//! Integration tests for the bundle listing route and health check.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{pattern, TestHarness};
use http_body_util::BodyExt;
use tower::ServiceExt;

async fn get_json(h: &TestHarness, uri: &str) -> (StatusCode, serde_json::Value) {
    let resp = h
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn lists_show_bundles_with_public_fields() {
    let h = TestHarness::new();
    h.add_bundle("BQACAgHASHED", Some("AgADh1"), "AgADh1rest", 30, pattern(10));
    h.add_bundle("BQACAgLEGACY", None, "AgADl2rest", 31, pattern(10));

    let (status, json) = get_json(&h, "/api/v1/show/42/bundles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["show_id"], 42);

    let bundles = json["bundles"].as_array().unwrap();
    assert_eq!(bundles.len(), 2);
    let ids: Vec<&str> = bundles.iter().map(|b| b["id"].as_str().unwrap()).collect();
    assert!(ids.contains(&"AgADh1"));
    assert!(ids.contains(&"BQACAgLEGACY"));

    for bundle in bundles {
        assert!(bundle.get("chat_id").is_none());
        assert!(bundle.get("msg_id").is_none());
        assert_eq!(bundle["season"], 1);
    }
}

#[tokio::test]
async fn unknown_show_has_no_bundles() {
    let h = TestHarness::new();
    let (status, json) = get_json(&h, "/api/v1/show/7/bundles").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["bundles"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn bundle_listing_needs_no_upstream() {
    let h = TestHarness::with_connections(0);
    h.add_bundle("BQACAgONLY", Some("AgADon"), "AgADonly", 32, pattern(10));

    let (status, _) = get_json(&h, "/api/v1/show/42/bundles").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(h.source.property_fetches(), 0);
}

#[tokio::test]
async fn health_reports_connections() {
    let h = TestHarness::with_connections(3);
    let (status, json) = get_json(&h, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["connections"], 3);
}

#[tokio::test]
async fn cors_preflight_allows_range() {
    let h = TestHarness::new();
    let resp = h
        .router()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/stream/tt100")
                .header("origin", "https://player.example")
                .header("access-control-request-method", "GET")
                .header("access-control-request-headers", "range")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(resp.status().is_success());
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    let allowed = resp.headers()["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_lowercase();
    assert!(allowed.contains("range"));
}
