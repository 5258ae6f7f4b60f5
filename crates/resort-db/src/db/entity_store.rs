use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use resort_core::models::{
    EntityRef, RetentionCandidate, SensitiveDocumentRef, VersionedCollection,
};
use resort_core::AppError;
use uuid::Uuid;

/// Persistence contract for image collections and booking documents.
///
/// Image collection writes are conditional on the version read earlier;
/// a stale version yields `AppError::VersionConflict` and nothing is written.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Bookings with a document attached whose eligibility date is on or before `cutoff`
    async fn find_candidates_for_retention(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<RetentionCandidate>, AppError>;

    /// Clear the document URL and upload timestamp and reset the purge attempt
    /// counter, but only while the booking still references `expected_url`.
    ///
    /// Returns `false` without writing when the booking references another
    /// document or none at all; an unknown booking is `NotFound`.
    async fn clear_document_ref(
        &self,
        booking_id: Uuid,
        expected_url: &str,
    ) -> Result<bool, AppError>;

    /// Current sensitive document of a booking, if any
    async fn read_document_ref(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<SensitiveDocumentRef>, AppError>;

    /// Count one failed purge and return the updated attempt count
    async fn record_purge_failure(&self, booking_id: Uuid) -> Result<i32, AppError>;

    /// Attach (or replace) the sensitive document of a booking
    async fn attach_document(
        &self,
        booking_id: Uuid,
        url: &str,
        uploaded_at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn read_image_collection(&self, entity: EntityRef)
        -> Result<VersionedCollection, AppError>;

    /// Replace the collection if its version still equals `expected_version`; returns the new version
    async fn write_image_collection(
        &self,
        entity: EntityRef,
        images: &[String],
        expected_version: i64,
    ) -> Result<i64, AppError>;
}
