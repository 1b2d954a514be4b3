use serde::{Deserialize, Serialize};
use chrono::NaiveDate;

use shared_database::DatabaseError;

/// Clinical-facing patient record; at most one per account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub ethnicity: Option<String>,
    pub account_id: Option<String>,
}

impl Patient {
    pub fn has_blank_name(&self) -> bool {
        self.full_name.trim().is_empty()
    }
}

/// Just enough of a patient to label an appointment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: i64,
    pub full_name: String,
}

impl From<&Patient> for PatientSummary {
    fn from(patient: &Patient) -> Self {
        Self {
            id: patient.id,
            full_name: patient.full_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPatient {
    pub full_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub ethnicity: Option<String>,
    pub account_id: Option<String>,
}

/// Field-level changes; `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientChanges {
    pub full_name: Option<String>,
    pub date_of_birth: Option<Option<NaiveDate>>,
    pub ethnicity: Option<Option<String>>,
}

impl PatientChanges {
    pub fn rename(full_name: impl Into<String>) -> Self {
        Self {
            full_name: Some(full_name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.date_of_birth.is_none() && self.ethnicity.is_none()
    }

    pub fn apply_to(&self, patient: &mut Patient) {
        if let Some(full_name) = &self.full_name {
            patient.full_name = full_name.clone();
        }
        if let Some(date_of_birth) = self.date_of_birth {
            patient.date_of_birth = date_of_birth;
        }
        if let Some(ethnicity) = &self.ethnicity {
            patient.ethnicity = ethnicity.clone();
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub ethnicity: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("Patient not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<DatabaseError> for PatientError {
    fn from(e: DatabaseError) -> Self {
        PatientError::DatabaseError(e.to_string())
    }
}
