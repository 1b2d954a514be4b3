use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use shared_models::error::AppError;

use crate::models::DoctorError;
use crate::services::doctor::DoctorService;

impl From<DoctorError> for AppError {
    fn from(e: DoctorError) -> Self {
        match e {
            DoctorError::NotFound(id) => AppError::NotFound(format!("Doctor {} not found", id)),
            DoctorError::InvalidSeed(msg) => AppError::Internal(msg),
            DoctorError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(service): State<Arc<DoctorService>>,
) -> Result<Json<Value>, AppError> {
    let doctors = service.list_doctors().await?;

    Ok(Json(json!({
        "total": doctors.len(),
        "doctors": doctors,
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(service): State<Arc<DoctorService>>,
    Path(doctor_id): Path<i64>,
) -> Result<Json<Value>, AppError> {
    let doctor = service.get_doctor(doctor_id).await?;
    Ok(Json(json!(doctor)))
}
