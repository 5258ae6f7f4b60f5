//! Resort Storage Library
//!
//! This crate wraps the remote image host used for activity photos, vehicle
//! photos and uploaded driver's-license images.
//!
//! # Delivery URLs
//!
//! The rest of the system only persists public delivery URLs. The store
//! itself deletes by an opaque file id, so `MediaStoreClient::delete_by_url`
//! resolves a URL back to a folder and file name (see `keys`) and then walks
//! the ordered `DeleteStrategy` list until one confirms the delete.
//!
//! When credentials are missing outside production the client runs in
//! degraded mode: uploads return a placeholder URL and deletes fail.

pub mod client;
pub mod factory;
pub mod imagekit;
pub mod keys;
pub mod strategy;
pub mod traits;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

// Re-export commonly used types
pub use client::{DeleteOutcome, MediaStoreClient, UploadOptions, UploadPayload};
pub use factory::create_object_store;
pub use imagekit::ImageKitStore;
pub use strategy::DeleteStrategy;
pub use traits::{ObjectStore, StorageError, StorageResult, StoredFile, TransformSpec, UploadObject};
