//! In-memory entity store for testing

use crate::db::entity_store::EntityStore;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use resort_core::models::{
    EntityRef, ImageCollection, RetentionCandidate, SensitiveDocumentRef, VersionedCollection,
};
use resort_core::AppError;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct BookingRow {
    check_in: NaiveDate,
    license_url: Option<String>,
    license_uploaded_at: Option<DateTime<Utc>>,
    purge_attempts: i32,
}

#[derive(Default)]
struct MemoryState {
    collections: HashMap<EntityRef, VersionedCollection>,
    bookings: HashMap<Uuid, BookingRow>,
    concurrent_appends: HashMap<EntityRef, VecDeque<String>>,
    concurrent_replacements: HashMap<Uuid, String>,
    failing_clears: HashSet<Uuid>,
    fail_candidate_query: bool,
    write_calls: usize,
    clear_calls: Vec<Uuid>,
}

/// Mock entity store that keeps rows in memory
#[derive(Clone, Default)]
pub struct MemoryEntityStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity with an image collection at version 0
    pub fn insert_entity(&self, entity: EntityRef, images: Vec<&str>) {
        self.state.lock().unwrap().collections.insert(
            entity,
            VersionedCollection {
                images: images.into(),
                version: 0,
            },
        );
    }

    /// Seed a booking, optionally with a document attached
    pub fn insert_booking(&self, booking_id: Uuid, check_in: NaiveDate, license_url: Option<&str>) {
        self.state.lock().unwrap().bookings.insert(
            booking_id,
            BookingRow {
                check_in,
                license_url: license_url.map(String::from),
                license_uploaded_at: license_url.map(|_| Utc::now()),
                purge_attempts: 0,
            },
        );
    }

    /// Set the recorded purge attempts of a booking
    pub fn set_purge_attempts(&self, booking_id: Uuid, attempts: i32) {
        if let Some(row) = self.state.lock().unwrap().bookings.get_mut(&booking_id) {
            row.purge_attempts = attempts;
        }
    }

    pub fn images(&self, entity: EntityRef) -> Option<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(&entity)
            .map(|c| c.images.clone().into_vec())
    }

    pub fn version(&self, entity: EntityRef) -> Option<i64> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(&entity)
            .map(|c| c.version)
    }

    pub fn document_url(&self, booking_id: Uuid) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .bookings
            .get(&booking_id)
            .and_then(|b| b.license_url.clone())
    }

    pub fn document_uploaded_at(&self, booking_id: Uuid) -> Option<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .bookings
            .get(&booking_id)
            .and_then(|b| b.license_uploaded_at)
    }

    pub fn purge_attempts(&self, booking_id: Uuid) -> Option<i32> {
        self.state
            .lock()
            .unwrap()
            .bookings
            .get(&booking_id)
            .map(|b| b.purge_attempts)
    }

    /// Simulate another writer appending `url` just before the next write to `entity`
    pub fn schedule_concurrent_append(&self, entity: EntityRef, url: &str) {
        self.state
            .lock()
            .unwrap()
            .concurrent_appends
            .entry(entity)
            .or_default()
            .push_back(url.to_string());
    }

    /// Simulate the user attaching `url` just before the next clear of this booking
    pub fn schedule_document_replacement(&self, booking_id: Uuid, url: &str) {
        self.state
            .lock()
            .unwrap()
            .concurrent_replacements
            .insert(booking_id, url.to_string());
    }

    /// Make `clear_document_ref` fail for this booking
    pub fn fail_clear_for(&self, booking_id: Uuid) {
        self.state.lock().unwrap().failing_clears.insert(booking_id);
    }

    pub fn allow_clear_for(&self, booking_id: Uuid) {
        self.state.lock().unwrap().failing_clears.remove(&booking_id);
    }

    pub fn fail_candidate_query(&self, fail: bool) {
        self.state.lock().unwrap().fail_candidate_query = fail;
    }

    pub fn write_calls(&self) -> usize {
        self.state.lock().unwrap().write_calls
    }

    pub fn clear_calls(&self) -> Vec<Uuid> {
        self.state.lock().unwrap().clear_calls.clone()
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn find_candidates_for_retention(
        &self,
        cutoff: NaiveDate,
    ) -> Result<Vec<RetentionCandidate>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_candidate_query {
            return Err(AppError::Internal("injected candidate query failure".to_string()));
        }

        let mut candidates: Vec<RetentionCandidate> = state
            .bookings
            .iter()
            .filter(|(_, b)| b.check_in <= cutoff)
            .filter_map(|(id, b)| {
                let url = b.license_url.as_ref().filter(|u| !u.is_empty())?;
                Some(RetentionCandidate {
                    booking_id: *id,
                    document_url: url.clone(),
                    document_uploaded_at: b.license_uploaded_at,
                    eligibility_date: b.check_in,
                    purge_attempts: b.purge_attempts,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.eligibility_date
                .cmp(&b.eligibility_date)
                .then(a.booking_id.cmp(&b.booking_id))
        });
        Ok(candidates)
    }

    async fn clear_document_ref(
        &self,
        booking_id: Uuid,
        expected_url: &str,
    ) -> Result<bool, AppError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.clear_calls.push(booking_id);
        if state.failing_clears.contains(&booking_id) {
            return Err(AppError::Internal(format!(
                "injected clear failure for booking {}",
                booking_id
            )));
        }
        let row = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))?;

        if let Some(url) = state.concurrent_replacements.remove(&booking_id) {
            row.license_url = Some(url);
            row.license_uploaded_at = Some(Utc::now());
            row.purge_attempts = 0;
        }

        if row.license_url.as_deref() != Some(expected_url) {
            return Ok(false);
        }
        row.license_url = None;
        row.license_uploaded_at = None;
        row.purge_attempts = 0;
        Ok(true)
    }

    async fn read_document_ref(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<SensitiveDocumentRef>, AppError> {
        let state = self.state.lock().unwrap();
        let row = state
            .bookings
            .get(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))?;
        Ok(row
            .license_url
            .clone()
            .filter(|u| !u.is_empty())
            .map(|url| SensitiveDocumentRef {
                url,
                uploaded_at: row.license_uploaded_at,
            }))
    }

    async fn record_purge_failure(&self, booking_id: Uuid) -> Result<i32, AppError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))?;
        row.purge_attempts += 1;
        Ok(row.purge_attempts)
    }

    async fn attach_document(
        &self,
        booking_id: Uuid,
        url: &str,
        uploaded_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking_id)))?;
        row.license_url = Some(url.to_string());
        row.license_uploaded_at = Some(uploaded_at);
        row.purge_attempts = 0;
        Ok(())
    }

    async fn read_image_collection(
        &self,
        entity: EntityRef,
    ) -> Result<VersionedCollection, AppError> {
        self.state
            .lock()
            .unwrap()
            .collections
            .get(&entity)
            .cloned()
            .ok_or_else(|| AppError::NotFound(entity.to_string()))
    }

    async fn write_image_collection(
        &self,
        entity: EntityRef,
        images: &[String],
        expected_version: i64,
    ) -> Result<i64, AppError> {
        let mut guard = self.state.lock().unwrap();
        let state = &mut *guard;
        state.write_calls += 1;

        let current = state
            .collections
            .get_mut(&entity)
            .ok_or_else(|| AppError::NotFound(entity.to_string()))?;

        if let Some(url) = state
            .concurrent_appends
            .get_mut(&entity)
            .and_then(VecDeque::pop_front)
        {
            let mut urls = current.images.clone().into_vec();
            urls.push(url);
            current.images = ImageCollection::new(urls);
            current.version += 1;
        }

        if current.version != expected_version {
            return Err(AppError::VersionConflict {
                expected: expected_version,
                actual: Some(current.version),
            });
        }

        current.images = ImageCollection::new(images.to_vec());
        current.version += 1;
        Ok(current.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn stale_write_is_rejected() {
        let store = MemoryEntityStore::new();
        let entity = EntityRef::vehicle(Uuid::new_v4());
        store.insert_entity(entity, vec!["a"]);

        let v1 = store
            .write_image_collection(entity, &["a".to_string(), "b".to_string()], 0)
            .await
            .unwrap();
        assert_eq!(v1, 1);

        let err = store
            .write_image_collection(entity, &["x".to_string()], 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::VersionConflict { expected: 0, actual: Some(1) }
        ));
        assert_eq!(store.images(entity).unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn missing_entity_is_not_found() {
        let store = MemoryEntityStore::new();
        let err = store
            .read_image_collection(EntityRef::activity(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn candidates_respect_cutoff_and_attachment() {
        let store = MemoryEntityStore::new();
        let old = Uuid::new_v4();
        let boundary = Uuid::new_v4();
        let recent = Uuid::new_v4();
        let empty = Uuid::new_v4();
        store.insert_booking(old, date("2026-01-01"), Some("https://ik.imagekit.io/r/licenses/a.jpg"));
        store.insert_booking(boundary, date("2026-01-10"), Some("https://ik.imagekit.io/r/licenses/b.jpg"));
        store.insert_booking(recent, date("2026-01-11"), Some("https://ik.imagekit.io/r/licenses/c.jpg"));
        store.insert_booking(empty, date("2025-12-01"), None);

        let candidates = store
            .find_candidates_for_retention(date("2026-01-10"))
            .await
            .unwrap();

        let ids: Vec<Uuid> = candidates.iter().map(|c| c.booking_id).collect();
        assert_eq!(ids, vec![old, boundary]);
    }

    #[tokio::test]
    async fn clearing_resets_document_and_attempts() {
        let store = MemoryEntityStore::new();
        let id = Uuid::new_v4();
        let url = "https://ik.imagekit.io/r/licenses/a.jpg";
        store.insert_booking(id, date("2026-01-01"), Some(url));
        assert_eq!(store.record_purge_failure(id).await.unwrap(), 1);
        assert_eq!(store.record_purge_failure(id).await.unwrap(), 2);

        assert!(store.clear_document_ref(id, url).await.unwrap());
        assert!(!store.clear_document_ref(id, url).await.unwrap());

        assert_eq!(store.document_url(id), None);
        assert_eq!(store.document_uploaded_at(id), None);
        assert_eq!(store.purge_attempts(id), Some(0));
        assert_eq!(store.read_document_ref(id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn clearing_keeps_a_replaced_document() {
        let store = MemoryEntityStore::new();
        let id = Uuid::new_v4();
        let old = "https://ik.imagekit.io/r/licenses/old.jpg";
        let new = "https://ik.imagekit.io/r/licenses/new.jpg";
        store.insert_booking(id, date("2026-01-01"), Some(old));
        store.schedule_document_replacement(id, new);

        assert!(!store.clear_document_ref(id, old).await.unwrap());

        let current = store.read_document_ref(id).await.unwrap().unwrap();
        assert_eq!(current.url, new);
        assert!(current.uploaded_at.is_some());
    }

    #[tokio::test]
    async fn clearing_unknown_booking_is_not_found() {
        let store = MemoryEntityStore::new();
        let err = store
            .clear_document_ref(Uuid::new_v4(), "https://ik.imagekit.io/r/licenses/a.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
