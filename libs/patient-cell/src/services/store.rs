use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use shared_database::{DatabaseError, DbResult, SupabaseClient};

use crate::models::{NewPatient, Patient, PatientChanges};

/// Persistence for patient profiles. Implementations must reject a second
/// profile for the same account with `DatabaseError::UniqueViolation`.
#[async_trait]
pub trait PatientStore: Send + Sync {
    async fn find_by_account(&self, account_id: &str) -> DbResult<Option<Patient>>;

    async fn get_patient(&self, patient_id: i64) -> DbResult<Option<Patient>>;

    async fn insert_patient(&self, patient: NewPatient) -> DbResult<Patient>;

    async fn update_patient(&self, patient_id: i64, changes: PatientChanges) -> DbResult<Option<Patient>>;
}

pub struct SupabasePatientStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabasePatientStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl PatientStore for SupabasePatientStore {
    async fn find_by_account(&self, account_id: &str) -> DbResult<Option<Patient>> {
        debug!("Looking up patient profile for account {}", account_id);
        let path = format!("/rest/v1/patients?account_id=eq.{}&limit=1", urlencoding::encode(account_id));
        self.supabase.select_one(&path).await
    }

    async fn get_patient(&self, patient_id: i64) -> DbResult<Option<Patient>> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        self.supabase.select_one(&path).await
    }

    async fn insert_patient(&self, patient: NewPatient) -> DbResult<Patient> {
        self.supabase.insert("patients", serde_json::to_value(&patient)?).await
    }

    async fn update_patient(&self, patient_id: i64, changes: PatientChanges) -> DbResult<Option<Patient>> {
        let mut update_data = Map::new();
        if let Some(full_name) = changes.full_name {
            update_data.insert("full_name".to_string(), json!(full_name));
        }
        if let Some(date_of_birth) = changes.date_of_birth {
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth));
        }
        if let Some(ethnicity) = changes.ethnicity {
            update_data.insert("ethnicity".to_string(), json!(ethnicity));
        }

        if update_data.is_empty() {
            return self.get_patient(patient_id).await;
        }

        let rows: Vec<Patient> = self.supabase
            .update("patients", &format!("id=eq.{}", patient_id), Value::Object(update_data))
            .await?;
        Ok(rows.into_iter().next())
    }
}

#[derive(Default)]
struct PatientTable {
    next_id: i64,
    rows: BTreeMap<i64, Patient>,
}

/// Patient profiles held in process memory. Enforces the unique account link.
#[derive(Default)]
pub struct InMemoryPatientStore {
    table: RwLock<PatientTable>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.table.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PatientStore for InMemoryPatientStore {
    async fn find_by_account(&self, account_id: &str) -> DbResult<Option<Patient>> {
        Ok(self.table.read().await.rows
            .values()
            .find(|p| p.account_id.as_deref() == Some(account_id))
            .cloned())
    }

    async fn get_patient(&self, patient_id: i64) -> DbResult<Option<Patient>> {
        Ok(self.table.read().await.rows.get(&patient_id).cloned())
    }

    async fn insert_patient(&self, patient: NewPatient) -> DbResult<Patient> {
        let mut table = self.table.write().await;

        if let Some(account_id) = patient.account_id.as_deref() {
            if table.rows.values().any(|p| p.account_id.as_deref() == Some(account_id)) {
                return Err(DatabaseError::UniqueViolation(format!(
                    "patients_account_id_key: account {} already has a profile", account_id
                )));
            }
        }

        table.next_id += 1;
        let stored = Patient {
            id: table.next_id,
            full_name: patient.full_name,
            date_of_birth: patient.date_of_birth,
            ethnicity: patient.ethnicity,
            account_id: patient.account_id,
        };
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn update_patient(&self, patient_id: i64, changes: PatientChanges) -> DbResult<Option<Patient>> {
        let mut table = self.table.write().await;
        Ok(table.rows.get_mut(&patient_id).map(|patient| {
            changes.apply_to(patient);
            patient.clone()
        }))
    }
}
