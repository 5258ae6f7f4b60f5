use crate::images::mutator::{apply, remove_at};
use resort_core::models::{EntityRef, ImageCollection, ImageUpdate, ImageUpdateRequest};
use resort_core::AppError;
use resort_db::EntityStore;
use resort_storage::{MediaStoreClient, UploadOptions, UploadPayload};
use std::sync::Arc;
use std::time::Instant;

/// Read, mutate and conditionally write image collections.
///
/// Writes carry the version they were computed from. When another writer
/// got there first the collection is re-read and the mutation re-applied,
/// up to `max_attempts` times before the conflict is returned.
#[derive(Clone)]
pub struct ImageCollectionService {
    entities: Arc<dyn EntityStore>,
    media: MediaStoreClient,
    max_attempts: u32,
}

impl ImageCollectionService {
    pub fn new(entities: Arc<dyn EntityStore>, media: MediaStoreClient, max_attempts: u32) -> Self {
        Self {
            entities,
            media,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Apply an update request and return the resulting collection
    #[tracing::instrument(skip(self, request, entity), fields(entity = %entity))]
    pub async fn update(
        &self,
        entity: EntityRef,
        request: &ImageUpdateRequest,
    ) -> Result<ImageCollection, AppError> {
        let update = ImageUpdate::from_request(request);
        self.apply_update(entity, update).await
    }

    /// Remove the image at `index`
    #[tracing::instrument(skip(self, entity), fields(entity = %entity))]
    pub async fn remove(&self, entity: EntityRef, index: usize) -> Result<ImageCollection, AppError> {
        self.commit(entity, "remove_at", |current| remove_at(current, index))
            .await
    }

    /// Upload files and append their URLs to the collection.
    ///
    /// Nothing is written unless every upload succeeded.
    #[tracing::instrument(skip(self, entity, payloads, options), fields(entity = %entity, files = payloads.len()))]
    pub async fn upload_and_append(
        &self,
        entity: EntityRef,
        payloads: Vec<UploadPayload>,
        options: &UploadOptions,
    ) -> Result<ImageCollection, AppError> {
        let mut urls = self.media.upload_many(payloads, options).await?;

        let update = match urls.len() {
            0 => ImageUpdate::NoChange,
            1 => ImageUpdate::AppendOne(urls.remove(0)),
            _ => ImageUpdate::AppendMany(urls),
        };
        self.apply_update(entity, update).await
    }

    async fn apply_update(
        &self,
        entity: EntityRef,
        update: ImageUpdate,
    ) -> Result<ImageCollection, AppError> {
        if update.is_no_change() {
            tracing::debug!(entity = %entity, "Image update resolved to no change; skipping write");
            let current = self.entities.read_image_collection(entity).await?;
            return Ok(current.images);
        }

        let label = update.label();
        self.commit(entity, label, |current| Ok(apply(current, &update)))
            .await
    }

    async fn commit<F>(
        &self,
        entity: EntityRef,
        operation: &'static str,
        mutate: F,
    ) -> Result<ImageCollection, AppError>
    where
        F: Fn(&ImageCollection) -> Result<ImageCollection, AppError> + Send + Sync,
    {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let current = self.entities.read_image_collection(entity).await?;
            let next = mutate(&current.images)?;

            match self
                .entities
                .write_image_collection(entity, next.as_slice(), current.version)
                .await
            {
                Ok(version) => {
                    tracing::info!(
                        entity = %entity,
                        operation,
                        version,
                        images = next.len(),
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Image collection updated"
                    );
                    return Ok(next);
                }
                Err(AppError::VersionConflict { expected, actual }) if attempt < self.max_attempts => {
                    tracing::warn!(
                        entity = %entity,
                        operation,
                        expected,
                        actual = ?actual,
                        attempt,
                        "Concurrent image collection write; retrying"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        entity = %entity,
                        operation,
                        attempt,
                        error = %e,
                        "Image collection write failed"
                    );
                    return Err(e);
                }
            }
        }
    }
}
