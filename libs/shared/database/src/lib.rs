pub mod error;
pub mod supabase;

pub use error::DatabaseError;
pub use supabase::{DbResult, SupabaseClient};
