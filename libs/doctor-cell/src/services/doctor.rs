use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use shared_database::{DbResult, SupabaseClient};

use crate::models::{Doctor, DoctorError, StaffType};

/// Read access to bookable doctors.
#[async_trait]
pub trait DoctorDirectory: Send + Sync {
    /// A doctor by id. Non-doctor staff are reported as absent.
    async fn get_doctor(&self, doctor_id: i64) -> DbResult<Option<Doctor>>;

    /// All doctors ordered by full name.
    async fn list_doctors(&self) -> DbResult<Vec<Doctor>>;
}

pub struct SupabaseDoctorDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseDoctorDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl DoctorDirectory for SupabaseDoctorDirectory {
    async fn get_doctor(&self, doctor_id: i64) -> DbResult<Option<Doctor>> {
        debug!("Fetching doctor {}", doctor_id);
        let path = format!("/rest/v1/doctor_directory?id=eq.{}&staff_type=eq.doctor", doctor_id);
        self.supabase.select_one(&path).await
    }

    async fn list_doctors(&self) -> DbResult<Vec<Doctor>> {
        self.supabase
            .select("/rest/v1/doctor_directory?staff_type=eq.doctor&order=full_name.asc")
            .await
    }
}

/// Directory held in process memory, used by the `memory` backend and tests.
#[derive(Default)]
pub struct InMemoryDoctorDirectory {
    staff: RwLock<BTreeMap<i64, Doctor>>,
}

impl InMemoryDoctorDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doctors(doctors: impl IntoIterator<Item = Doctor>) -> Self {
        Self {
            staff: RwLock::new(doctors.into_iter().map(|d| (d.id, d)).collect()),
        }
    }

    /// Load a JSON array of staff rows.
    pub fn from_seed_file(path: impl AsRef<Path>) -> Result<Self, DoctorError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| DoctorError::InvalidSeed(format!("{}: {}", path.display(), e)))?;
        let doctors: Vec<Doctor> = serde_json::from_str(&raw)
            .map_err(|e| DoctorError::InvalidSeed(format!("{}: {}", path.display(), e)))?;

        info!("Loaded {} staff entries from {}", doctors.len(), path.display());
        Ok(Self::with_doctors(doctors))
    }
}

#[async_trait]
impl DoctorDirectory for InMemoryDoctorDirectory {
    async fn get_doctor(&self, doctor_id: i64) -> DbResult<Option<Doctor>> {
        Ok(self.staff.read().await
            .get(&doctor_id)
            .filter(|d| d.staff_type == StaffType::Doctor)
            .cloned())
    }

    async fn list_doctors(&self) -> DbResult<Vec<Doctor>> {
        let mut doctors: Vec<Doctor> = self.staff.read().await
            .values()
            .filter(|d| d.is_bookable())
            .cloned()
            .collect();
        doctors.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(doctors)
    }
}

pub struct DoctorService {
    directory: Arc<dyn DoctorDirectory>,
}

impl DoctorService {
    pub fn new(directory: Arc<dyn DoctorDirectory>) -> Self {
        Self { directory }
    }

    pub async fn get_doctor(&self, doctor_id: i64) -> Result<Doctor, DoctorError> {
        self.directory
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound(doctor_id))
    }

    pub async fn list_doctors(&self) -> Result<Vec<Doctor>, DoctorError> {
        Ok(self.directory.list_doctors().await?)
    }
}
