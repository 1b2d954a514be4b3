pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod store;

pub use booking::{validate_booking_request, AppointmentBookingService};
pub use conflict::{ConflictDetectionService, SlotKey};
pub use lifecycle::{AppointmentLifecycleService, TransitionPolicy};
pub use store::{AppointmentStore, InMemoryAppointmentStore, SupabaseAppointmentStore};
