use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Local};
use serde_json::{json, Value};
use tower::ServiceExt;

use appointment_cell::router::appointment_routes;
use appointment_cell::services::{AppointmentBookingService, InMemoryAppointmentStore};
use appointment_cell::models::SLOT_TAKEN_MESSAGE;
use doctor_cell::models::{Doctor, StaffType};
use doctor_cell::services::InMemoryDoctorDirectory;
use patient_cell::services::{InMemoryPatientStore, PatientProfileService};
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

struct TestApp {
    config: TestConfig,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let config = TestConfig::default();
        let doctors = Arc::new(InMemoryDoctorDirectory::with_doctors(vec![Doctor {
            id: 7,
            full_name: "Dr. Tran".to_string(),
            staff_type: StaffType::Doctor,
            position: "Cardiologist".to_string(),
            expertise: Some("Cardiology".to_string()),
            phone_number: None,
            account_id: None,
        }]));
        let profiles = Arc::new(PatientProfileService::new(Arc::new(InMemoryPatientStore::new())));
        let service = Arc::new(AppointmentBookingService::new(
            Arc::new(InMemoryAppointmentStore::new()),
            doctors,
            profiles,
        ));

        let router = appointment_routes(config.to_arc(), service);
        Self { config, router }
    }

    fn token(&self, user: &TestUser) -> String {
        JwtTestUtils::create_test_token(user, &self.config.jwt_secret, None)
    }

    async fn send(&self, method: &str, uri: &str, user: &TestUser, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {}", self.token(user)))
            .header("Content-Type", "application/json")
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }
}

fn next_week() -> String {
    (Local::now().date_naive() + Duration::days(7)).to_string()
}

fn booking_body() -> Value {
    json!({
        "date": next_week(),
        "time_frame": "09:00-09:30",
        "doctor_id": 7
    })
}

#[tokio::test]
async fn test_book_then_conflict() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com").with_username("alice");
    let bob = TestUser::patient("bob@example.com");

    let (status, body) = app.send("POST", "/", &alice, Some(booking_body())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["appointment"]["status"], "pending");
    assert_eq!(body["appointment"]["doctor_id"], 7);

    let (status, body) = app.send("POST", "/", &bob, Some(booking_body())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], SLOT_TAKEN_MESSAGE);
}

#[tokio::test]
async fn test_invalid_booking_reports_fields() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    let (status, body) = app
        .send("POST", "/", &alice, Some(json!({ "date": "2000-01-01", "time_frame": "  " })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["doctor_id", "time_frame", "date"]);
}

#[tokio::test]
async fn test_mistyped_booking_fields_are_named() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    let (status, body) = app
        .send("POST", "/", &alice, Some(json!({
            "date": "2025-13-01",
            "time_frame": "09:00-09:30",
            "doctor_id": "abc"
        })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Validation failed");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|f| f["field"].as_str())
        .collect();
    assert_eq!(fields, vec!["date", "doctor_id"]);
}

#[tokio::test]
async fn test_unparseable_bodies_are_validation_errors() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");
    let admin = TestUser::admin("admin@hospital.test");

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Authorization", format!("Bearer {}", app.token(&alice)))
        .header("Content-Type", "application/json")
        .body(Body::from("{\"doctor_id\": 7,"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["fields"][0]["field"], "body");

    let (_, booked) = app.send("POST", "/", &alice, Some(booking_body())).await;
    let uri = format!("/{}/status", booked["appointment"]["id"]);
    let (status, body) = app.send("PATCH", &uri, &admin, Some(json!({ "status": "archived" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "status");
}

#[tokio::test]
async fn test_booking_unknown_doctor_is_404() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");

    let mut body = booking_body();
    body["doctor_id"] = json!(404);
    let (status, _) = app.send("POST", "/", &alice, Some(body)).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_status_change_requires_staff() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");
    let doctor = TestUser::doctor("doc@hospital.test");
    let receptionist = TestUser::receptionist("desk@hospital.test");

    let (_, booked) = app.send("POST", "/", &alice, Some(booking_body())).await;
    let uri = format!("/{}/status", booked["appointment"]["id"]);
    let confirm = json!({ "status": "confirmed" });

    let (status, _) = app.send("PATCH", &uri, &alice, Some(confirm.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.send("PATCH", &uri, &receptionist, Some(confirm.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("PATCH", &uri, &doctor, Some(confirm.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["appointment"]["status"], "confirmed");

    let (status, _) = app.send("PATCH", "/999/status", &doctor, Some(confirm)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cancel_frees_slot_over_http() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");
    let admin = TestUser::admin("admin@hospital.test");

    let (_, booked) = app.send("POST", "/", &alice, Some(booking_body())).await;
    let uri = format!("/{}/status", booked["appointment"]["id"]);

    let (status, _) = app.send("PATCH", &uri, &admin, Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.send("POST", "/", &alice, Some(booking_body())).await;
    assert_eq!(status, StatusCode::CREATED);

    // The old row cannot be revived while the new booking holds the slot.
    let (status, _) = app.send("PATCH", &uri, &admin, Some(json!({ "status": "pending" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_search_and_details_are_staff_only() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");
    let admin = TestUser::admin("admin@hospital.test");

    let (_, booked) = app.send("POST", "/", &alice, Some(booking_body())).await;
    let id = booked["appointment"]["id"].as_i64().unwrap();

    let (status, _) = app.send("GET", "/?status=pending", &alice, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("GET", "/?status=pending&doctor_id=7", &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["limit"], 50);

    let (status, body) = app.send("GET", &format!("/{}", id), &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["doctor"]["full_name"], "Dr. Tran");
    assert_eq!(body["patient"]["full_name"], "alice@example.com");

    let (status, _) = app.send("GET", "/12345", &admin, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_my_appointments_lists_own_bookings() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com").with_username("alice");
    let bob = TestUser::patient("bob@example.com");

    let (status, body) = app.send("GET", "/mine", &alice, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    app.send("POST", "/", &alice, Some(booking_body())).await;

    let (_, body) = app.send("GET", "/mine", &alice, None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["appointments"][0]["time_frame"], "09:00-09:30");
    assert_eq!(body["appointments"][0]["doctor"]["full_name"], "Dr. Tran");

    let (_, body) = app.send("GET", "/mine", &bob, None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_delete_requires_admin() {
    let app = TestApp::new();
    let alice = TestUser::patient("alice@example.com");
    let doctor = TestUser::doctor("doc@hospital.test");
    let admin = TestUser::admin("admin@hospital.test");

    let (_, booked) = app.send("POST", "/", &alice, Some(booking_body())).await;
    let uri = format!("/{}", booked["appointment"]["id"]);

    let (status, _) = app.send("DELETE", &uri, &doctor, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send("DELETE", &uri, &admin, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, _) = app.send("DELETE", &uri, &admin, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requests_without_token_are_rejected() {
    let app = TestApp::new();

    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Content-Type", "application/json")
        .body(Body::from(booking_body().to_string()))
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_supabase_session_token_grants_staff_role() {
    let app = TestApp::new();
    let doctor = TestUser::doctor("doc@hospital.test");

    let request = Request::builder()
        .method("GET")
        .uri("/?doctor_id=7")
        .header(
            "Authorization",
            format!("Bearer {}", JwtTestUtils::create_supabase_token(&doctor, &app.config.jwt_secret)),
        )
        .body(Body::empty())
        .unwrap();

    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
