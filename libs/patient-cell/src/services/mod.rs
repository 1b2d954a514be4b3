pub mod profile;
pub mod store;

pub use profile::{fallback_display_name, PatientProfileService};
pub use store::{InMemoryPatientStore, PatientStore, SupabasePatientStore};
