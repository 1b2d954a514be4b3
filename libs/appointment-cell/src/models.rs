// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use doctor_cell::models::DoctorSummary;
use patient_cell::models::{PatientError, PatientSummary};
use shared_database::DatabaseError;
use shared_models::error::FieldError;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// One requested or confirmed clinical visit. `time_frame` is a free-text
/// slot label such as `08:00-08:30`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: i64,
    pub date: NaiveDate,
    pub time_frame: String,
    pub status: AppointmentStatus,
    pub patient_id: i64,
    pub doctor_id: i64,
}

impl Appointment {
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 4] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Confirmed,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    /// Every status except `Cancelled` occupies its slot.
    pub fn is_active(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(AppointmentStatus::Pending),
            "confirmed" => Ok(AppointmentStatus::Confirmed),
            "completed" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("unknown appointment status '{}'", other)),
        }
    }
}

/// Row written by the booking flow; the store assigns the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub date: NaiveDate,
    pub time_frame: String,
    pub status: AppointmentStatus,
    pub patient_id: i64,
    pub doctor_id: i64,
}

/// An appointment as shown to the patient who booked it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentWithDoctor {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor: Option<DoctorSummary>,
}

/// An appointment as shown to staff, naming both parties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor: Option<DoctorSummary>,
    pub patient: Option<PatientSummary>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

/// Booking form. Fields are optional so missing values are reported per
/// field instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub date: Option<NaiveDate>,
    pub time_frame: Option<String>,
    pub doctor_id: Option<i64>,
    /// Overrides the name on the caller's patient profile.
    pub display_name: Option<String>,
}

impl BookAppointmentRequest {
    /// Decode a booking body field by field, naming every field of the wrong type.
    pub fn from_json(body: &Value) -> Result<Self, AppointmentError> {
        let mut errors = Vec::new();

        let request = Self {
            date: json_field(body, "date", "Date must be a valid YYYY-MM-DD date", &mut errors),
            time_frame: json_field(body, "time_frame", "Time frame must be text", &mut errors),
            doctor_id: json_field(body, "doctor_id", "Invalid doctor", &mut errors),
            display_name: json_field(body, "display_name", "Display name must be text", &mut errors),
        };

        if errors.is_empty() {
            Ok(request)
        } else {
            Err(AppointmentError::Validation(errors))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

impl UpdateStatusRequest {
    pub fn from_json(body: &Value) -> Result<Self, AppointmentError> {
        let mut errors = Vec::new();
        let status = json_field::<AppointmentStatus>(body, "status", "Unknown appointment status", &mut errors);

        match status {
            Some(status) => Ok(Self { status }),
            None => {
                if errors.is_empty() {
                    errors.push(FieldError::new("status", "Status is required"));
                }
                Err(AppointmentError::Validation(errors))
            }
        }
    }
}

/// Read one optional field; `null` and absent both decode to `None`.
fn json_field<T: DeserializeOwned>(
    body: &Value,
    name: &str,
    message: &str,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    if !body.is_object() {
        if errors.is_empty() {
            errors.push(FieldError::new("body", "Expected a JSON object"));
        }
        return None;
    }

    match body.get(name) {
        None | Some(Value::Null) => None,
        Some(value) => T::deserialize(value)
            .map_err(|_| errors.push(FieldError::new(name, message)))
            .ok(),
    }
}

pub const DEFAULT_SEARCH_LIMIT: u32 = 50;
pub const MAX_SEARCH_LIMIT: u32 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchQuery {
    pub date: Option<NaiveDate>,
    pub doctor_id: Option<i64>,
    pub patient_id: Option<i64>,
    pub status: Option<AppointmentStatus>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl AppointmentSearchQuery {
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT)
    }

    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        self.date.map_or(true, |d| appointment.date == d)
            && self.doctor_id.map_or(true, |id| appointment.doctor_id == id)
            && self.patient_id.map_or(true, |id| appointment.patient_id == id)
            && self.status.map_or(true, |s| appointment.status == s)
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

pub const SLOT_TAKEN_MESSAGE: &str = "This time frame is already booked. Please choose another slot.";

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Invalid booking request")]
    Validation(Vec<FieldError>),

    #[error("{}", SLOT_TAKEN_MESSAGE)]
    SlotTaken,

    #[error("Appointment {0} not found")]
    NotFound(i64),

    #[error("Doctor {0} not found")]
    DoctorNotFound(i64),

    #[error("Appointment cannot move from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for AppointmentError {
    fn from(e: DatabaseError) -> Self {
        AppointmentError::DatabaseError(e.to_string())
    }
}

impl From<PatientError> for AppointmentError {
    fn from(e: PatientError) -> Self {
        AppointmentError::DatabaseError(e.to_string())
    }
}
