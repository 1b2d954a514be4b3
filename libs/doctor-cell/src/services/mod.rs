pub mod doctor;

pub use doctor::{DoctorDirectory, DoctorService, InMemoryDoctorDirectory, SupabaseDoctorDirectory};
