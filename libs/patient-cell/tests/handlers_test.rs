use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use patient_cell::router::patient_routes;
use patient_cell::services::{InMemoryPatientStore, PatientProfileService};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn create_test_app(config: &TestConfig, store: Arc<InMemoryPatientStore>) -> Router {
    patient_routes(config.to_arc(), Arc::new(PatientProfileService::new(store)))
}

async fn send(app: Router, method: &str, token: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri("/profile")
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_get_profile_creates_on_first_visit() {
    let config = TestConfig::default();
    let store = Arc::new(InMemoryPatientStore::new());
    let user = TestUser::patient("alice@example.com").with_username("alice");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let (status, body) = send(create_test_app(&config, store.clone()), "GET", &token, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["full_name"], "alice");
    assert_eq!(body["profile"]["account_id"], user.id);
    assert_eq!(body["account_email"], "alice@example.com");

    let (_, again) = send(create_test_app(&config, store.clone()), "GET", &token, None).await;
    assert_eq!(again["profile"]["id"], body["profile"]["id"]);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_put_profile_updates_fields() {
    let config = TestConfig::default();
    let store = Arc::new(InMemoryPatientStore::new());
    let token = JwtTestUtils::create_test_token(&TestUser::patient("dan@example.com"), &config.jwt_secret, None);

    let (status, body) = send(
        create_test_app(&config, store),
        "PUT",
        &token,
        Some(json!({ "full_name": "Dan Vu", "date_of_birth": "1985-02-20", "ethnicity": "Tay" })),
    ).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["profile"]["full_name"], "Dan Vu");
    assert_eq!(body["profile"]["date_of_birth"], "1985-02-20");
    assert_eq!(body["profile"]["ethnicity"], "Tay");
}

#[tokio::test]
async fn test_profile_requires_valid_token() {
    let config = TestConfig::default();
    let store = Arc::new(InMemoryPatientStore::new());
    let token = JwtTestUtils::create_invalid_signature_token(&TestUser::default());

    let (status, _) = send(create_test_app(&config, store.clone()), "GET", &token, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(store.is_empty().await);
}
