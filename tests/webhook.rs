//! Integration tests for the webhook endpoint.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::TestApp;
use cqbot::security::signature;
use std::time::Duration;
use tower::ServiceExt;

const SECRET: &str = "webhook-secret";

fn body() -> Vec<u8> {
    br#"{"post_type":"message","message_type":"private","sub_type":"friend","user_id":10000,"message":"help","self_id":514}"#.to_vec()
}

fn request(body: Vec<u8>, signature: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("X-Signature", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

#[tokio::test]
async fn test_missing_signature() {
    let t = TestApp::new();
    let router = cqbot::http::router(t.app.clone(), Some(SECRET.to_string()));
    let response = router.oneshot(request(body(), None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_bad_signature() {
    let t = TestApp::new();
    let router = cqbot::http::router(t.app.clone(), Some(SECRET.to_string()));
    let forged = signature::sign("other-secret", &body());
    let response = router.oneshot(request(body(), Some(forged))).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_undecodable_body() {
    let t = TestApp::new();
    let router = cqbot::http::router(t.app.clone(), None);
    let response = router
        .oneshot(request(b"{\"post_type\":\"unknown\"}".to_vec(), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_signed_event_dispatched() {
    let t = TestApp::new();
    let router = cqbot::http::router(t.app.clone(), Some(SECRET.to_string()));
    let signed = signature::sign(SECRET, &body());
    let response = router.oneshot(request(body(), Some(signed))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Dispatch runs on its own task.
    let mut texts = Vec::new();
    for _ in 0..50 {
        texts = t.sender.texts();
        if !texts.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(texts.len(), 1);
    assert!(texts[0].starts_with("Available commands:"));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    cqbot::metrics::init();
    let t = TestApp::new();
    let router = cqbot::http::router(t.app.clone(), None);
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
