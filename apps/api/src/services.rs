use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use appointment_cell::services::{
    AppointmentBookingService, AppointmentStore, InMemoryAppointmentStore,
    SupabaseAppointmentStore, TransitionPolicy,
};
use doctor_cell::services::{
    DoctorDirectory, DoctorService, InMemoryDoctorDirectory, SupabaseDoctorDirectory,
};
use patient_cell::services::{
    InMemoryPatientStore, PatientProfileService, PatientStore, SupabasePatientStore,
};
use shared_config::{AppConfig, StoreBackend};
use shared_database::SupabaseClient;

struct Stores {
    directory: Arc<dyn DoctorDirectory>,
    patients: Arc<dyn PatientStore>,
    appointments: Arc<dyn AppointmentStore>,
}

impl Stores {
    fn supabase(config: &AppConfig) -> anyhow::Result<Self> {
        if !config.is_configured() {
            anyhow::bail!("STORE_BACKEND=supabase requires SUPABASE_URL and SUPABASE_ANON_PUBLIC_KEY");
        }
        if !config.has_service_role_key() {
            warn!("SUPABASE_SERVICE_ROLE_KEY not set, writes will use the anon key");
        }

        let supabase = Arc::new(SupabaseClient::new(config));
        Ok(Self {
            directory: Arc::new(SupabaseDoctorDirectory::new(Arc::clone(&supabase))),
            patients: Arc::new(SupabasePatientStore::new(Arc::clone(&supabase))),
            appointments: Arc::new(SupabaseAppointmentStore::new(supabase)),
        })
    }

    fn memory(config: &AppConfig) -> anyhow::Result<Self> {
        let directory = match &config.doctor_seed_file {
            Some(path) => InMemoryDoctorDirectory::from_seed_file(path)
                .with_context(|| format!("loading doctor seed file {}", path))?,
            None => {
                warn!("No DOCTOR_SEED_FILE set, the doctor directory is empty");
                InMemoryDoctorDirectory::new()
            }
        };

        Ok(Self {
            directory: Arc::new(directory),
            patients: Arc::new(InMemoryPatientStore::new()),
            appointments: Arc::new(InMemoryAppointmentStore::new()),
        })
    }
}

/// Services shared by the cell routers.
#[derive(Clone)]
pub struct AppServices {
    pub doctors: Arc<DoctorService>,
    pub profiles: Arc<PatientProfileService>,
    pub appointments: Arc<AppointmentBookingService>,
}

impl AppServices {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let policy = config.appointment_transition_policy
            .parse::<TransitionPolicy>()
            .unwrap_or_else(|e| {
                warn!("{}, falling back to {}", e, TransitionPolicy::default());
                TransitionPolicy::default()
            });

        let stores = match config.store_backend {
            StoreBackend::Supabase => Stores::supabase(config)?,
            StoreBackend::Memory => Stores::memory(config)?,
        };

        info!("Using {} store backend with {} transition policy", config.store_backend, policy);

        let profiles = Arc::new(PatientProfileService::new(stores.patients));
        let appointments = Arc::new(AppointmentBookingService::with_policy(
            stores.appointments,
            Arc::clone(&stores.directory),
            Arc::clone(&profiles),
            policy,
        ));

        Ok(Self {
            doctors: Arc::new(DoctorService::new(stores.directory)),
            profiles,
            appointments,
        })
    }
}
