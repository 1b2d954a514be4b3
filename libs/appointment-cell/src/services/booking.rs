// libs/appointment-cell/src/services/booking.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use doctor_cell::models::DoctorSummary;
use doctor_cell::services::DoctorDirectory;
use patient_cell::models::PatientSummary;
use patient_cell::services::PatientProfileService;
use shared_models::auth::AccountIdentity;
use shared_models::error::FieldError;
use shared_utils::access::{AdminOverride, ManageAppointments};

use crate::models::{
    Appointment, AppointmentDetails, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    AppointmentWithDoctor, BookAppointmentRequest, NewAppointment,
};
use crate::services::conflict::{ConflictDetectionService, SlotKey};
use crate::services::lifecycle::{AppointmentLifecycleService, TransitionPolicy};
use crate::services::store::AppointmentStore;

/// Owns booking-time conflict checks and status transitions.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    doctors: Arc<dyn DoctorDirectory>,
    profiles: Arc<PatientProfileService>,
    conflict_service: ConflictDetectionService,
    lifecycle_service: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorDirectory>,
        profiles: Arc<PatientProfileService>,
    ) -> Self {
        Self::with_policy(store, doctors, profiles, TransitionPolicy::default())
    }

    pub fn with_policy(
        store: Arc<dyn AppointmentStore>,
        doctors: Arc<dyn DoctorDirectory>,
        profiles: Arc<PatientProfileService>,
        policy: TransitionPolicy,
    ) -> Self {
        let conflict_service = ConflictDetectionService::new(Arc::clone(&store));

        Self {
            store,
            doctors,
            profiles,
            conflict_service,
            lifecycle_service: AppointmentLifecycleService::new(policy),
        }
    }

    // ==============================================================================
    // BOOKING
    // ==============================================================================

    /// Book a slot for the acting account, judging "today" in server-local time.
    pub async fn request_appointment(
        &self,
        account: &AccountIdentity,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        self.request_appointment_on(account, request, Local::now().date_naive()).await
    }

    /// Book a slot as of `today`.
    ///
    /// The patient profile is ensured before the conflict check, so a
    /// rejected booking may still leave a newly created profile behind.
    pub async fn request_appointment_on(
        &self,
        account: &AccountIdentity,
        request: BookAppointmentRequest,
        today: NaiveDate,
    ) -> Result<Appointment, AppointmentError> {
        let slot = validate_booking_request(&request, today)?;

        if self.doctors.get_doctor(slot.doctor_id).await?.is_none() {
            warn!("Booking rejected: doctor {} does not exist", slot.doctor_id);
            return Err(AppointmentError::DoctorNotFound(slot.doctor_id));
        }

        let patient = self.profiles
            .ensure_profile(account, request.display_name.as_deref())
            .await?;

        self.conflict_service.ensure_slot_free(&slot).await?;

        let new_appointment = NewAppointment {
            date: slot.date,
            time_frame: slot.time_frame.clone(),
            status: AppointmentStatus::Pending,
            patient_id: patient.id,
            doctor_id: slot.doctor_id,
        };

        match self.store.insert_appointment(new_appointment).await {
            Ok(appointment) => {
                info!(
                    "Appointment {} requested by patient {} with doctor {} on {} {}",
                    appointment.id, patient.id, appointment.doctor_id, appointment.date, appointment.time_frame
                );
                Ok(appointment)
            }
            Err(e) if e.is_unique_violation() => {
                warn!(
                    "Slot {:?} for doctor {} on {} was taken concurrently",
                    slot.time_frame, slot.doctor_id, slot.date
                );
                Err(AppointmentError::SlotTaken)
            }
            Err(e) if e.is_foreign_key_violation() => {
                warn!("Doctor {} was removed before appointment could be stored: {}", slot.doctor_id, e);
                Err(AppointmentError::DoctorNotFound(slot.doctor_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    // ==============================================================================
    // STAFF OPERATIONS
    // ==============================================================================

    pub async fn transition_status(
        &self,
        grant: &ManageAppointments,
        appointment_id: i64,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get_appointment(grant, appointment_id).await?;

        self.lifecycle_service.validate_status_transition(&current.status, &new_status)?;

        let updated = match self.store.update_status(appointment_id, new_status).await {
            Ok(Some(updated)) => updated,
            Ok(None) => return Err(AppointmentError::NotFound(appointment_id)),
            Err(e) if e.is_unique_violation() => {
                warn!("Appointment {} cannot become {}: its slot is taken", appointment_id, new_status);
                return Err(AppointmentError::SlotTaken);
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            "Appointment {} moved from {} to {} by {} ({})",
            appointment_id, current.status, updated.status, grant.account_id(), grant.role()
        );
        Ok(updated)
    }

    pub async fn get_appointment(
        &self,
        _grant: &ManageAppointments,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        self.store
            .get_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    /// One appointment with its doctor and patient named.
    pub async fn get_appointment_details(
        &self,
        grant: &ManageAppointments,
        appointment_id: i64,
    ) -> Result<AppointmentDetails, AppointmentError> {
        let appointment = self.get_appointment(grant, appointment_id).await?;
        let mut details = self.describe(vec![appointment]).await?;
        details.pop().ok_or(AppointmentError::NotFound(appointment_id))
    }

    pub async fn search_appointments(
        &self,
        _grant: &ManageAppointments,
        query: &AppointmentSearchQuery,
    ) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        debug!("Searching appointments with {:?}", query);
        let appointments = self.store.search(query).await?;
        self.describe(appointments).await
    }

    /// Physically remove an appointment. Not part of the normal flow.
    pub async fn delete_appointment(
        &self,
        grant: &AdminOverride,
        appointment_id: i64,
    ) -> Result<Appointment, AppointmentError> {
        let deleted = self.store
            .delete_appointment(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))?;

        warn!("Appointment {} deleted by admin {}", appointment_id, grant.account_id());
        Ok(deleted)
    }

    // ==============================================================================
    // PATIENT VIEW
    // ==============================================================================

    /// The acting account's appointments, newest first. Never creates a profile.
    pub async fn list_my_appointments(
        &self,
        account: &AccountIdentity,
    ) -> Result<Vec<AppointmentWithDoctor>, AppointmentError> {
        let Some(patient) = self.profiles.find_profile(account).await? else {
            debug!("Account {} has no patient profile yet", account.account_id);
            return Ok(Vec::new());
        };

        let appointments = self.store.list_for_patient(patient.id).await?;

        let mut doctors = DoctorCache::default();
        let mut listing = Vec::with_capacity(appointments.len());
        for appointment in appointments {
            let doctor = doctors.summary(self.doctors.as_ref(), appointment.doctor_id).await?;
            listing.push(AppointmentWithDoctor { appointment, doctor });
        }

        Ok(listing)
    }

    async fn describe(&self, appointments: Vec<Appointment>) -> Result<Vec<AppointmentDetails>, AppointmentError> {
        let mut doctors = DoctorCache::default();
        let mut patients: HashMap<i64, Option<PatientSummary>> = HashMap::new();
        let mut details = Vec::with_capacity(appointments.len());

        for appointment in appointments {
            let doctor = doctors.summary(self.doctors.as_ref(), appointment.doctor_id).await?;
            let patient = match patients.get(&appointment.patient_id) {
                Some(cached) => cached.clone(),
                None => {
                    let summary = self.profiles
                        .find_patient(appointment.patient_id)
                        .await?
                        .as_ref()
                        .map(PatientSummary::from);
                    patients.insert(appointment.patient_id, summary.clone());
                    summary
                }
            };
            details.push(AppointmentDetails { appointment, doctor, patient });
        }

        Ok(details)
    }
}

/// Doctor summaries looked up once per listing.
#[derive(Default)]
struct DoctorCache(HashMap<i64, Option<DoctorSummary>>);

impl DoctorCache {
    async fn summary(
        &mut self,
        directory: &dyn DoctorDirectory,
        doctor_id: i64,
    ) -> Result<Option<DoctorSummary>, AppointmentError> {
        if let Some(cached) = self.0.get(&doctor_id) {
            return Ok(cached.clone());
        }
        let summary = directory.get_doctor(doctor_id).await?.as_ref().map(DoctorSummary::from);
        self.0.insert(doctor_id, summary.clone());
        Ok(summary)
    }
}

/// Check the booking form, reporting every failing field at once.
pub fn validate_booking_request(
    request: &BookAppointmentRequest,
    today: NaiveDate,
) -> Result<SlotKey, AppointmentError> {
    let mut errors = Vec::new();

    let doctor_id = match request.doctor_id {
        Some(id) if id > 0 => Some(id),
        Some(_) => {
            errors.push(FieldError::new("doctor_id", "Invalid doctor"));
            None
        }
        None => {
            errors.push(FieldError::new("doctor_id", "Please select a doctor"));
            None
        }
    };

    let time_frame = request.time_frame
        .as_deref()
        .map(str::trim)
        .filter(|tf| !tf.is_empty());
    if time_frame.is_none() {
        errors.push(FieldError::new("time_frame", "Time frame is required"));
    }

    match request.date {
        Some(date) if date < today => {
            errors.push(FieldError::new("date", "Appointment date cannot be in the past"));
        }
        Some(_) => {}
        None => errors.push(FieldError::new("date", "Date is required")),
    }

    match (doctor_id, time_frame, request.date) {
        (Some(doctor_id), Some(time_frame), Some(date)) if errors.is_empty() => {
            Ok(SlotKey::new(doctor_id, date, time_frame))
        }
        _ => {
            debug!("Booking request rejected: {:?}", errors);
            Err(AppointmentError::Validation(errors))
        }
    }
}
