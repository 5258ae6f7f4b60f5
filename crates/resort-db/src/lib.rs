//! Resort Database Library
//!
//! Persistence for the media lifecycle: image collections on activities and
//! vehicles, and sensitive documents attached to bookings. Callers depend on
//! the `EntityStore` trait; `PgEntityStore` is the production implementation.

pub mod db;

pub use db::{connect, run_migrations, EntityStore, PgEntityStore};

#[cfg(any(test, feature = "test-helpers"))]
pub use db::MemoryEntityStore;
