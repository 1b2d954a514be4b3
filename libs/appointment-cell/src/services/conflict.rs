use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::models::{Appointment, AppointmentError};
use crate::services::store::AppointmentStore;

/// The (doctor, date, time frame) triple that at most one active
/// appointment may hold. The label is trimmed and otherwise compared
/// exactly, case included.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub doctor_id: i64,
    pub date: NaiveDate,
    pub time_frame: String,
}

impl SlotKey {
    pub fn new(doctor_id: i64, date: NaiveDate, time_frame: &str) -> Self {
        Self {
            doctor_id,
            date,
            time_frame: time_frame.trim().to_string(),
        }
    }

    pub fn of(appointment: &Appointment) -> Self {
        Self::new(appointment.doctor_id, appointment.date, &appointment.time_frame)
    }

    pub fn matches(&self, appointment: &Appointment) -> bool {
        appointment.doctor_id == self.doctor_id
            && appointment.date == self.date
            && appointment.time_frame.trim() == self.time_frame
    }
}

pub struct ConflictDetectionService {
    store: Arc<dyn AppointmentStore>,
}

impl ConflictDetectionService {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }

    /// The active appointment holding `slot`, if any.
    pub async fn find_conflict(&self, slot: &SlotKey) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Checking slot {:?} for doctor {} on {}", slot.time_frame, slot.doctor_id, slot.date);
        Ok(self.store.find_active_in_slot(slot).await?)
    }

    pub async fn ensure_slot_free(&self, slot: &SlotKey) -> Result<(), AppointmentError> {
        match self.find_conflict(slot).await? {
            Some(existing) => {
                warn!(
                    "Slot {:?} for doctor {} on {} already held by appointment {}",
                    slot.time_frame, slot.doctor_id, slot.date, existing.id
                );
                Err(AppointmentError::SlotTaken)
            }
            None => Ok(()),
        }
    }
}
