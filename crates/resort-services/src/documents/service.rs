use bytes::Bytes;
use chrono::Utc;
use resort_core::models::SensitiveDocumentRef;
use resort_core::AppError;
use resort_db::EntityStore;
use resort_storage::MediaStoreClient;
use std::sync::Arc;
use uuid::Uuid;

/// Uploads license photos and attaches them to bookings.
///
/// The retention sweeper later purges what this service attaches.
#[derive(Clone)]
pub struct LicenseDocumentService {
    entities: Arc<dyn EntityStore>,
    media: MediaStoreClient,
    folder: String,
}

impl LicenseDocumentService {
    pub fn new(entities: Arc<dyn EntityStore>, media: MediaStoreClient, folder: impl Into<String>) -> Self {
        Self {
            entities,
            media,
            folder: folder.into(),
        }
    }

    /// Upload a license photo and make it the booking's document.
    ///
    /// The previous document, if any, is deleted from the store once the new
    /// reference is committed. A failed delete of the old object is logged
    /// and does not fail the upload.
    #[tracing::instrument(skip(self, booking_id, payload), fields(booking_id = %booking_id))]
    pub async fn upload(
        &self,
        booking_id: Uuid,
        payload: Bytes,
        file_name: &str,
    ) -> Result<SensitiveDocumentRef, AppError> {
        let previous = self.entities.read_document_ref(booking_id).await?;

        let url = self
            .media
            .upload(payload, &self.folder, file_name, None)
            .await?;
        let uploaded_at = Utc::now();

        self.entities
            .attach_document(booking_id, &url, uploaded_at)
            .await?;

        tracing::info!(booking_id = %booking_id, url = %url, "License document attached");

        if let Some(previous) = previous.filter(|p| p.url != url) {
            match self.media.delete_by_url(&previous.url).await {
                Ok(outcome) => tracing::info!(
                    booking_id = %booking_id,
                    url = %previous.url,
                    outcome = ?outcome,
                    "Replaced license document deleted"
                ),
                Err(e) => tracing::warn!(
                    booking_id = %booking_id,
                    url = %previous.url,
                    error = %e,
                    "Failed to delete replaced license document"
                ),
            }
        }

        Ok(SensitiveDocumentRef {
            url,
            uploaded_at: Some(uploaded_at),
        })
    }

    /// Delete the booking's document from the store, then drop the reference.
    ///
    /// The reference is kept when the remote delete fails so the retention
    /// sweeper can retry. A booking without a document is a no-op.
    #[tracing::instrument(skip(self, booking_id), fields(booking_id = %booking_id))]
    pub async fn remove(&self, booking_id: Uuid) -> Result<(), AppError> {
        let Some(current) = self.entities.read_document_ref(booking_id).await? else {
            tracing::debug!(booking_id = %booking_id, "No license document to remove");
            return Ok(());
        };

        let outcome = self.media.delete_by_url(&current.url).await.map_err(|e| {
            tracing::warn!(
                booking_id = %booking_id,
                url = %current.url,
                error = %e,
                "License document delete failed; reference retained"
            );
            AppError::from(e)
        })?;

        let cleared = self
            .entities
            .clear_document_ref(booking_id, &current.url)
            .await?;

        if cleared {
            tracing::info!(
                booking_id = %booking_id,
                url = %current.url,
                outcome = ?outcome,
                "License document removed"
            );
        } else {
            tracing::info!(
                booking_id = %booking_id,
                url = %current.url,
                "License document removed; booking reference changed meanwhile"
            );
        }
        Ok(())
    }
}
