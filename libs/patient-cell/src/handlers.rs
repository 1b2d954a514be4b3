use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, State, Extension},
    Json,
};
use serde_json::{json, Value};

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{PatientError, UpdateProfileRequest};
use crate::services::PatientProfileService;

impl From<PatientError> for AppError {
    fn from(e: PatientError) -> Self {
        match e {
            PatientError::NotFound => AppError::NotFound("Patient profile not found".to_string()),
            PatientError::ValidationError(msg) => AppError::BadRequest(msg),
            PatientError::DatabaseError(msg) => AppError::Database(msg),
        }
    }
}

/// Returns the caller's profile, creating it on first visit.
#[axum::debug_handler]
pub async fn get_profile(
    State(service): State<Arc<PatientProfileService>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let patient = service.ensure_profile(&user.account(), None).await?;

    Ok(Json(json!({
        "profile": patient,
        "account_email": user.email,
    })))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(service): State<Arc<PatientProfileService>>,
    Extension(user): Extension<User>,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let patient = service.update_profile(&user.account(), request).await?;

    Ok(Json(json!({
        "success": true,
        "profile": patient,
        "message": "Profile saved",
    })))
}
