use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::RwLock;
use tracing::debug;

use shared_database::{DatabaseError, DbResult, SupabaseClient};

use crate::models::{Appointment, AppointmentSearchQuery, AppointmentStatus, NewAppointment};
use crate::services::conflict::SlotKey;

/// Name of the partial unique index guarding active slots.
pub const ACTIVE_SLOT_INDEX: &str = "appointments_active_slot_idx";

/// Appointment persistence.
///
/// Implementations must refuse, with `DatabaseError::UniqueViolation`, any
/// write that would leave two active appointments on the same slot. This
/// covers both inserts and status changes that re-activate a cancelled row.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_appointment(&self, appointment_id: i64) -> DbResult<Option<Appointment>>;

    async fn find_active_in_slot(&self, slot: &SlotKey) -> DbResult<Option<Appointment>>;

    async fn insert_appointment(&self, appointment: NewAppointment) -> DbResult<Appointment>;

    async fn update_status(&self, appointment_id: i64, status: AppointmentStatus) -> DbResult<Option<Appointment>>;

    /// Matching appointments ordered by date, then time frame.
    async fn search(&self, query: &AppointmentSearchQuery) -> DbResult<Vec<Appointment>>;

    /// A patient's appointments, newest date first.
    async fn list_for_patient(&self, patient_id: i64) -> DbResult<Vec<Appointment>>;

    async fn delete_appointment(&self, appointment_id: i64) -> DbResult<Option<Appointment>>;
}

// ==============================================================================
// SUPABASE / POSTGREST
// ==============================================================================

pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn search_path(query: &AppointmentSearchQuery) -> String {
        let mut query_parts = Vec::new();

        if let Some(date) = query.date {
            query_parts.push(format!("date=eq.{}", date));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(format!("doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = query.patient_id {
            query_parts.push(format!("patient_id=eq.{}", patient_id));
        }
        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }

        query_parts.push("order=date.asc,time_frame.asc".to_string());
        query_parts.push(format!("limit={}", query.effective_limit()));
        query_parts.push(format!("offset={}", query.effective_offset()));

        format!("/rest/v1/appointments?{}", query_parts.join("&"))
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn get_appointment(&self, appointment_id: i64) -> DbResult<Option<Appointment>> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        self.supabase.select_one(&path).await
    }

    async fn find_active_in_slot(&self, slot: &SlotKey) -> DbResult<Option<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&time_frame=eq.{}&status=neq.{}&limit=1",
            slot.doctor_id,
            slot.date,
            urlencoding::encode(&slot.time_frame),
            AppointmentStatus::Cancelled,
        );
        self.supabase.select_one(&path).await
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> DbResult<Appointment> {
        debug!("Inserting appointment for doctor {} on {}", appointment.doctor_id, appointment.date);
        self.supabase.insert("appointments", serde_json::to_value(&appointment)?).await
    }

    async fn update_status(&self, appointment_id: i64, status: AppointmentStatus) -> DbResult<Option<Appointment>> {
        let rows: Vec<Appointment> = self.supabase
            .update("appointments", &format!("id=eq.{}", appointment_id), json!({ "status": status }))
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn search(&self, query: &AppointmentSearchQuery) -> DbResult<Vec<Appointment>> {
        self.supabase.select(&Self::search_path(query)).await
    }

    async fn list_for_patient(&self, patient_id: i64) -> DbResult<Vec<Appointment>> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=date.desc,time_frame.desc",
            patient_id
        );
        self.supabase.select(&path).await
    }

    async fn delete_appointment(&self, appointment_id: i64) -> DbResult<Option<Appointment>> {
        let rows: Vec<Appointment> = self.supabase
            .delete("appointments", &format!("id=eq.{}", appointment_id))
            .await?;
        Ok(rows.into_iter().next())
    }
}

// ==============================================================================
// IN-MEMORY
// ==============================================================================

#[derive(Default)]
struct AppointmentTable {
    next_id: i64,
    rows: BTreeMap<i64, Appointment>,
}

impl AppointmentTable {
    fn active_holder(&self, slot: &SlotKey, except: Option<i64>) -> Option<&Appointment> {
        self.rows
            .values()
            .filter(|a| Some(a.id) != except)
            .find(|a| a.is_active() && slot.matches(a))
    }
}

fn slot_violation(slot: &SlotKey, holder: &Appointment) -> DatabaseError {
    DatabaseError::UniqueViolation(format!(
        "{}: doctor {} on {} at {:?} already held by appointment {}",
        ACTIVE_SLOT_INDEX, slot.doctor_id, slot.date, slot.time_frame, holder.id
    ))
}

/// Appointments held in process memory. Check and write happen under one
/// write lock, so the active-slot rule holds under concurrent requests.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    table: RwLock<AppointmentTable>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn all(&self) -> Vec<Appointment> {
        self.table.read().await.rows.values().cloned().collect()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn get_appointment(&self, appointment_id: i64) -> DbResult<Option<Appointment>> {
        Ok(self.table.read().await.rows.get(&appointment_id).cloned())
    }

    async fn find_active_in_slot(&self, slot: &SlotKey) -> DbResult<Option<Appointment>> {
        Ok(self.table.read().await.active_holder(slot, None).cloned())
    }

    async fn insert_appointment(&self, appointment: NewAppointment) -> DbResult<Appointment> {
        let mut table = self.table.write().await;

        let slot = SlotKey::new(appointment.doctor_id, appointment.date, &appointment.time_frame);
        if appointment.status.is_active() {
            if let Some(holder) = table.active_holder(&slot, None) {
                return Err(slot_violation(&slot, holder));
            }
        }

        table.next_id += 1;
        let stored = Appointment {
            id: table.next_id,
            date: appointment.date,
            time_frame: slot.time_frame,
            status: appointment.status,
            patient_id: appointment.patient_id,
            doctor_id: appointment.doctor_id,
        };
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_status(&self, appointment_id: i64, status: AppointmentStatus) -> DbResult<Option<Appointment>> {
        let mut table = self.table.write().await;

        let Some(current) = table.rows.get(&appointment_id) else {
            return Ok(None);
        };

        if status.is_active() {
            let slot = SlotKey::of(current);
            if let Some(holder) = table.active_holder(&slot, Some(appointment_id)) {
                return Err(slot_violation(&slot, holder));
            }
        }

        Ok(table.rows.get_mut(&appointment_id).map(|appointment| {
            appointment.status = status;
            appointment.clone()
        }))
    }

    async fn search(&self, query: &AppointmentSearchQuery) -> DbResult<Vec<Appointment>> {
        let mut matches: Vec<Appointment> = self.table.read().await.rows
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        matches.sort_by(|a, b| (a.date, &a.time_frame, a.id).cmp(&(b.date, &b.time_frame, b.id)));

        Ok(matches
            .into_iter()
            .skip(query.effective_offset() as usize)
            .take(query.effective_limit() as usize)
            .collect())
    }

    async fn list_for_patient(&self, patient_id: i64) -> DbResult<Vec<Appointment>> {
        let mut appointments: Vec<Appointment> = self.table.read().await.rows
            .values()
            .filter(|a| a.patient_id == patient_id)
            .cloned()
            .collect();
        appointments.sort_by(|a, b| (b.date, &b.time_frame, b.id).cmp(&(a.date, &a.time_frame, a.id)));
        Ok(appointments)
    }

    async fn delete_appointment(&self, appointment_id: i64) -> DbResult<Option<Appointment>> {
        Ok(self.table.write().await.rows.remove(&appointment_id))
    }
}
