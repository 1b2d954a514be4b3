use std::fmt;

use serde::{Deserialize, Serialize};

/// Staff classification; only `Doctor` entries can be booked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StaffType {
    #[default]
    Staff,
    Doctor,
    Nursing,
}

impl fmt::Display for StaffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaffType::Staff => write!(f, "staff"),
            StaffType::Doctor => write!(f, "doctor"),
            StaffType::Nursing => write!(f, "nursing"),
        }
    }
}

/// A row of the `doctor_directory` view: a staff member with position and
/// expertise names resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: i64,
    pub full_name: String,
    #[serde(default)]
    pub staff_type: StaffType,
    pub position: String,
    pub expertise: Option<String>,
    pub phone_number: Option<String>,
    pub account_id: Option<String>,
}

impl Doctor {
    pub fn is_bookable(&self) -> bool {
        self.staff_type == StaffType::Doctor
    }
}

/// Compact doctor reference embedded in appointment listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: i64,
    pub full_name: String,
    pub position: String,
}

impl From<&Doctor> for DoctorSummary {
    fn from(doctor: &Doctor) -> Self {
        Self {
            id: doctor.id,
            full_name: doctor.full_name.clone(),
            position: doctor.position.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor {0} not found")]
    NotFound(i64),

    #[error("Invalid doctor seed data: {0}")]
    InvalidSeed(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<shared_database::DatabaseError> for DoctorError {
    fn from(e: shared_database::DatabaseError) -> Self {
        DoctorError::DatabaseError(e.to_string())
    }
}
