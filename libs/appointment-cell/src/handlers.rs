// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State, Extension},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::access::{AdminOverride, ManageAppointments};

use crate::models::{
    AppointmentError, AppointmentSearchQuery, BookAppointmentRequest, UpdateStatusRequest,
};
use crate::services::booking::AppointmentBookingService;

impl From<AppointmentError> for AppError {
    fn from(e: AppointmentError) -> Self {
        match e {
            AppointmentError::Validation(fields) => AppError::ValidationFailed(fields),
            AppointmentError::SlotTaken => AppError::Conflict(e.to_string()),
            AppointmentError::NotFound(_) | AppointmentError::DoctorNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            AppointmentError::InvalidStatusTransition { .. } => AppError::BadRequest(e.to_string()),
            AppointmentError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

// ==============================================================================
// PATIENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(body) = payload?;
    let request = BookAppointmentRequest::from_json(&body)?;
    let appointment = service.request_appointment(&user.account(), request).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment requested. It will be confirmed by hospital staff.",
    }))))
}

#[axum::debug_handler]
pub async fn list_my_appointments(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = service.list_my_appointments(&user.account()).await?;

    Ok(Json(json!({
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

// ==============================================================================
// STAFF HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn search_appointments(
    State(service): State<Arc<AppointmentBookingService>>,
    Extension(user): Extension<User>,
    Query(query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    let grant = ManageAppointments::authorize(&user)?;
    let appointments = service.search_appointments(&grant, &query).await?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len(),
        "limit": query.effective_limit(),
        "offset": query.effective_offset(),
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let grant = ManageAppointments::authorize(&user)?;
    let appointment = service.get_appointment_details(&grant, appointment_id).await?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(service): State<Arc<AppointmentBookingService>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let grant = ManageAppointments::authorize(&user)?;
    let Json(body) = payload?;
    let request = UpdateStatusRequest::from_json(&body)?;
    let appointment = service
        .transition_status(&grant, appointment_id, request.status)
        .await?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": format!("Appointment status set to {}", appointment.status),
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(service): State<Arc<AppointmentBookingService>>,
    Path(appointment_id): Path<i64>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let grant = AdminOverride::authorize(&user)?;
    let deleted = service.delete_appointment(&grant, appointment_id).await?;

    Ok(Json(json!({
        "success": true,
        "appointment": deleted,
        "message": "Appointment deleted",
    })))
}
