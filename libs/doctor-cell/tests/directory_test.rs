use std::io::Write;
use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};

use doctor_cell::models::{DoctorError, StaffType};
use doctor_cell::services::{DoctorDirectory, DoctorService, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
use shared_database::SupabaseClient;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

fn supabase_directory(mock_server: &MockServer) -> SupabaseDoctorDirectory {
    let config = TestConfig::with_supabase_url(&mock_server.uri()).to_app_config();
    SupabaseDoctorDirectory::new(Arc::new(SupabaseClient::new(&config)))
}

#[tokio::test]
async fn test_supabase_get_doctor_found() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_directory"))
        .and(query_param("id", "eq.7"))
        .and(query_param("staff_type", "eq.doctor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(7, "Dr. Tran", "Attending Physician", Some("Cardiology"))
        ])))
        .mount(&mock_server)
        .await;

    let doctor = supabase_directory(&mock_server)
        .get_doctor(7)
        .await
        .expect("request should succeed")
        .expect("doctor should exist");

    assert_eq!(doctor.id, 7);
    assert_eq!(doctor.full_name, "Dr. Tran");
    assert_eq!(doctor.staff_type, StaffType::Doctor);
    assert_eq!(doctor.expertise.as_deref(), Some("Cardiology"));
}

#[tokio::test]
async fn test_supabase_get_doctor_missing_is_none() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_directory"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(Arc::new(supabase_directory(&mock_server)));
    assert_matches!(service.get_doctor(99).await, Err(DoctorError::NotFound(99)));
}

#[tokio::test]
async fn test_supabase_list_doctors_orders_by_name() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_directory"))
        .and(query_param("order", "full_name.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_response(2, "Dr. Anh", "Resident", None),
            MockSupabaseResponses::doctor_response(1, "Dr. Binh", "Attending Physician", None)
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let doctors = supabase_directory(&mock_server).list_doctors().await.unwrap();
    assert_eq!(doctors.len(), 2);
    assert_eq!(doctors[0].full_name, "Dr. Anh");
}

#[tokio::test]
async fn test_supabase_server_error_is_database_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_directory"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("connection refused", "XX000")
        ))
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(Arc::new(supabase_directory(&mock_server)));
    assert_matches!(service.list_doctors().await, Err(DoctorError::DatabaseError(_)));
}

#[tokio::test]
async fn test_memory_directory_from_seed_file() {
    let mut seed = tempfile::NamedTempFile::new().unwrap();
    write!(seed, "{}", json!([
        MockSupabaseResponses::doctor_response(3, "Dr. Pham", "Attending Physician", Some("Pediatrics")),
        {
            "id": 4,
            "full_name": "Nurse Vo",
            "staff_type": "nursing",
            "position": "Head Nurse",
            "expertise": null,
            "phone_number": null,
            "account_id": null
        }
    ])).unwrap();

    let directory = InMemoryDoctorDirectory::from_seed_file(seed.path()).unwrap();
    let doctors = directory.list_doctors().await.unwrap();

    assert_eq!(doctors.len(), 1);
    assert_eq!(doctors[0].id, 3);
}

#[test]
fn test_memory_directory_rejects_bad_seed_file() {
    let mut seed = tempfile::NamedTempFile::new().unwrap();
    write!(seed, "not json").unwrap();

    assert!(matches!(
        InMemoryDoctorDirectory::from_seed_file(seed.path()),
        Err(DoctorError::InvalidSeed(_))
    ));
}
