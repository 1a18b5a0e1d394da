//! HTTP-level tests for the webhook router.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use gmsa_webhook::webhooks::{AdmissionEngine, WebhookState, create_webhook_router};
use gmsa_webhook::{FakeCredentialSpecStore, HealthState};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::{PodBuilder, ReviewBuilder, WEBAPP_CONTENTS};

fn router() -> (Router, Arc<HealthState>) {
    let store = FakeCredentialSpecStore::new()
        .with_spec("webapp-spec", WEBAPP_CONTENTS)
        .deny("default", "apps", "secret-spec", "no role binding");
    let health = Arc::new(HealthState::new());
    let state = Arc::new(WebhookState::new(AdmissionEngine::new(store), health.clone()));
    (create_webhook_router(state), health)
}

fn post_json(path: &str, body: &Value) -> Request<Body> {
    Request::post(path)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(router: Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn review(router: Router, path: &str, body: &Value) -> Value {
    let (status, body) = send(router, post_json(path, body)).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).unwrap()
}

/// Decode the patch carried in a review response, base64 or raw bytes
fn decode_patch(response: &Value) -> Value {
    let bytes = match &response["patch"] {
        Value::String(encoded) => STANDARD.decode(encoded).unwrap(),
        Value::Array(raw) => raw.iter().map(|b| b.as_u64().unwrap() as u8).collect(),
        other => panic!("unexpected patch encoding: {other}"),
    };
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_validate_allows_plain_pod_and_echoes_uid() {
    let (router, _) = router();
    let pod = PodBuilder::new("web").container("app").build_json();
    let body = ReviewBuilder::create(pod).uid("uid-123").review_json();

    let response = review(router, "/validate", &body).await;

    assert_eq!(response["kind"], "AdmissionReview");
    assert_eq!(response["response"]["uid"], "uid-123");
    assert_eq!(response["response"]["allowed"], true);
    assert!(response["response"]["patch"].is_null());
}

#[tokio::test]
async fn test_mutate_returns_json_patch() {
    let (router, _) = router();
    let pod = PodBuilder::new("web")
        .container_with("app", Some("webapp-spec"), None)
        .build_json();
    let body = ReviewBuilder::create(pod).review_json();

    let response = review(router, "/mutate", &body).await;

    assert_eq!(response["response"]["allowed"], true);
    assert_eq!(response["response"]["patchType"], "JSONPatch");
    assert_eq!(
        decode_patch(&response["response"]),
        json!([{
            "op": "add",
            "path": "/spec/containers/0/securityContext/windowsOptions/gmsaCredentialSpec",
            "value": WEBAPP_CONTENTS
        }])
    );
}

#[tokio::test]
async fn test_denial_is_encoded_in_review() {
    let (router, health) = router();
    let pod = PodBuilder::new("web")
        .credential_spec("secret-spec")
        .container("app")
        .build_json();
    let body = ReviewBuilder::create(pod).uid("uid-denied").review_json();

    let response = review(router, "/validate", &body).await;

    assert_eq!(response["response"]["uid"], "uid-denied");
    assert_eq!(response["response"]["allowed"], false);
    assert_eq!(response["response"]["status"]["code"], 403);
    let message = response["response"]["status"]["message"].as_str().unwrap();
    assert!(message.contains("secret-spec"));
    assert!(message.contains("no role binding"));

    assert!(
        health
            .metrics
            .encode()
            .contains(r#"endpoint="validate",verdict="denied""#)
    );
}

#[tokio::test]
async fn test_non_pod_review_is_denied_with_bad_request() {
    let (router, _) = router();
    let pod = PodBuilder::new("web").container("app").build_json();
    let body = ReviewBuilder::create(pod).kind("Deployment").review_json();

    let response = review(router, "/mutate", &body).await;

    assert_eq!(response["response"]["allowed"], false);
    assert_eq!(response["response"]["status"]["code"], 400);
}

#[tokio::test]
async fn test_review_without_request_is_bad_request() {
    let (router, _) = router();
    let body = json!({"apiVersion": "admission.k8s.io/v1", "kind": "AdmissionReview"});

    let (status, _) = send(router, post_json("/validate", &body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transport_errors() {
    let (router, _) = router();
    let body = ReviewBuilder::create(PodBuilder::new("web").build_json()).review_json();

    let (status, _) = send(router.clone(), post_json("/unknown", &body)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        router.clone(),
        Request::get("/validate").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);

    let (status, _) = send(
        router.clone(),
        Request::post("/validate")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

    let (status, _) = send(
        router,
        Request::post("/mutate")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert!(status.is_client_error());
}

#[tokio::test]
async fn test_health_routes_share_the_listener() {
    let (router, _) = router();

    let (status, _) = send(
        router.clone(),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(router, Request::get("/info").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&body).unwrap();
    assert!(info["version"].is_string());
}
