//! Resort Core Library
//!
//! This crate provides the domain models, error types and configuration shared
//! by the media lifecycle crates: image collections on listings and vehicles,
//! sensitive documents on bookings, and the retention policy that purges them.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{Config, MediaLifecycleConfig, ObjectStoreConfig, RetentionConfig};
pub use error::AppError;
