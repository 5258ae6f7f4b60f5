//! Object store abstraction trait
//!
//! This module defines the `ObjectStore` trait mirroring the remote content
//! host's API surface: upload, list by folder and name, delete by internal id.
//! The local system only ever persists public URLs; the `MediaStoreClient`
//! bridges that gap.

use async_trait::async_trait;
use bytes::Bytes;
use resort_core::AppError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Upload payload is empty")]
    EmptyPayload,

    #[error("Delete failed for {url}: {reason}")]
    DeleteFailed { url: String, reason: String },

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Object store call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ConfigError(msg) => AppError::MisconfiguredStore(msg),
            StorageError::EmptyPayload => AppError::InvalidInput(err.to_string()),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Store-side transformation applied at upload time (e.g. `w-1200,q-80`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformSpec(String);

impl TransformSpec {
    pub fn new(spec: impl Into<String>) -> Self {
        Self(spec.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One object to upload.
#[derive(Debug, Clone)]
pub struct UploadObject {
    pub data: Bytes,
    pub folder: String,
    pub file_name: String,
    pub transform: Option<TransformSpec>,
}

/// A stored object as reported by the remote host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Opaque internal identifier; the only handle the delete API accepts.
    pub file_id: String,
    pub name: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub file_path: Option<String>,
}

/// Remote object store contract.
///
/// `delete_file` must report a missing object as `StorageError::NotFound` so
/// callers can treat repeated deletes as idempotent.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload one object and return its stored descriptor (including public URL)
    async fn upload(&self, object: UploadObject) -> StorageResult<StoredFile>;

    /// List objects in `folder` whose name matches `file_name`, at most `limit` entries
    async fn list_files(
        &self,
        folder: &str,
        file_name: &str,
        limit: usize,
    ) -> StorageResult<Vec<StoredFile>>;

    /// Delete one object by its internal id
    async fn delete_file(&self, file_id: &str) -> StorageResult<()>;

    /// Short backend name used in logs
    fn backend_name(&self) -> &'static str;
}
