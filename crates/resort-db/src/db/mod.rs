//! Entity store implementations
//
// Store contract shared by every backend
pub mod entity_store;
//
// Postgres backend and pool setup
pub mod pool;
pub mod postgres;
//
// In-memory backend for tests
#[cfg(any(test, feature = "test-helpers"))]
pub mod memory;

pub use entity_store::EntityStore;
#[cfg(any(test, feature = "test-helpers"))]
pub use memory::MemoryEntityStore;
pub use pool::{connect, run_migrations};
pub use postgres::PgEntityStore;
