use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use doctor_cell::router::doctor_routes;
use patient_cell::router::patient_routes;
use shared_config::AppConfig;

use crate::services::AppServices;

pub fn create_router(config: Arc<AppConfig>, services: AppServices) -> Router {
    Router::new()
        .route("/", get(|| async { "Hospital booking API is running!" }))
        .nest("/doctors", doctor_routes(config.clone(), services.doctors))
        .nest("/patients", patient_routes(config.clone(), services.profiles))
        .nest("/appointments", appointment_routes(config, services.appointments))
}
