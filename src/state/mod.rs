//! Persistence: local SQLite database, hosted Supabase, and the shared store trait.

pub mod database;
pub mod schema;
pub mod store;
pub mod supabase;

pub use database::Database;
pub use store::{AgentStore, LocalStore};
pub use supabase::SupabaseStore;
