//! Media store client
//!
//! `MediaStoreClient` is the only entry point the rest of the system uses for
//! the remote image host. It adds what the raw `ObjectStore` contract lacks:
//! placeholder behaviour when the store is not configured, concurrent batch
//! uploads, per-call timeouts, and delete-by-URL on top of the id-based
//! delete API.

use crate::keys::parse_store_path;
use crate::strategy::{with_timeout, DeleteStrategy, DeleteTarget, StrategyVerdict};
use crate::traits::{ObjectStore, StorageError, StorageResult, TransformSpec, UploadObject};
use bytes::Bytes;
use futures::future::try_join_all;
use std::sync::Arc;
use std::time::Duration;

/// One file in a batch upload.
#[derive(Debug, Clone)]
pub struct UploadPayload {
    pub data: Bytes,
    pub file_name: String,
}

impl UploadPayload {
    pub fn new(data: impl Into<Bytes>, file_name: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            file_name: file_name.into(),
        }
    }
}

/// Options shared by every file of a batch upload.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    pub folder: String,
    pub transform: Option<TransformSpec>,
}

impl UploadOptions {
    pub fn folder(folder: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            transform: None,
        }
    }

    pub fn with_transform(mut self, transform: TransformSpec) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Successful result of `delete_by_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted {
        file_id: String,
        strategy: DeleteStrategy,
    },
    /// Nothing stored at this URL; a repeated delete lands here.
    AlreadyAbsent,
}

#[derive(Clone)]
enum Backend {
    Configured {
        store: Arc<dyn ObjectStore>,
        url_endpoint: String,
    },
    Degraded {
        reason: String,
    },
}

#[derive(Clone)]
pub struct MediaStoreClient {
    backend: Backend,
    placeholder_url: String,
    call_timeout: Duration,
}

impl MediaStoreClient {
    /// Create a client for a configured store
    ///
    /// # Arguments
    /// * `store` - Remote store implementation
    /// * `url_endpoint` - Public delivery endpoint the store's URLs start with
    /// * `call_timeout` - Bound applied to every individual store call
    pub fn new(store: Arc<dyn ObjectStore>, url_endpoint: impl Into<String>, call_timeout: Duration) -> Self {
        Self {
            backend: Backend::Configured {
                store,
                url_endpoint: url_endpoint.into().trim_end_matches('/').to_string(),
            },
            placeholder_url: resort_core::constants::PLACEHOLDER_IMAGE_URL.to_string(),
            call_timeout,
        }
    }

    /// Create a client that never touches the network and hands out the placeholder URL.
    pub fn degraded(reason: impl Into<String>, placeholder_url: impl Into<String>) -> Self {
        let reason = reason.into();
        let placeholder_url = placeholder_url.into();
        tracing::warn!(
            reason = %reason,
            placeholder_url = %placeholder_url,
            "Object store not configured; uploads will return the placeholder URL and deletes will fail"
        );
        Self {
            backend: Backend::Degraded { reason },
            placeholder_url,
            call_timeout: Duration::from_secs(resort_core::constants::DEFAULT_OBJECT_STORE_TIMEOUT_SECS),
        }
    }

    pub fn with_placeholder_url(mut self, placeholder_url: impl Into<String>) -> Self {
        self.placeholder_url = placeholder_url.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        matches!(self.backend, Backend::Configured { .. })
    }

    pub fn placeholder_url(&self) -> &str {
        &self.placeholder_url
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Upload one payload and return its public URL.
    ///
    /// In degraded mode the placeholder URL is returned without any network I/O.
    #[tracing::instrument(skip(self, payload, transform), fields(size_bytes = payload.len()))]
    pub async fn upload(
        &self,
        payload: Bytes,
        folder: &str,
        file_name: &str,
        transform: Option<TransformSpec>,
    ) -> StorageResult<String> {
        if payload.is_empty() {
            return Err(StorageError::EmptyPayload);
        }

        let store = match self.backend {
            Backend::Configured { ref store, .. } => store,
            Backend::Degraded { ref reason } => {
                tracing::warn!(
                    reason = %reason,
                    file_name = %file_name,
                    placeholder_url = %self.placeholder_url,
                    "Object store not configured; returning placeholder URL"
                );
                return Ok(self.placeholder_url.clone());
            }
        };

        let object = UploadObject {
            data: payload,
            folder: folder.to_string(),
            file_name: file_name.to_string(),
            transform,
        };

        let stored = with_timeout(self.call_timeout, store.upload(object))
            .await
            .map_err(|e| match e {
                StorageError::UploadFailed(_) => e,
                other => StorageError::UploadFailed(other.to_string()),
            })?;

        Ok(stored.url)
    }

    /// Upload every payload concurrently; URLs are returned in input order.
    ///
    /// Fails on the first rejected upload and returns none of the URLs already produced.
    #[tracing::instrument(skip(self, payloads, options), fields(files = payloads.len(), folder = %options.folder))]
    pub async fn upload_many(
        &self,
        payloads: Vec<UploadPayload>,
        options: &UploadOptions,
    ) -> StorageResult<Vec<String>> {
        let uploads = payloads.into_iter().map(|payload| async move {
            self.upload(
                payload.data,
                &options.folder,
                &payload.file_name,
                options.transform.clone(),
            )
            .await
        });

        let urls = try_join_all(uploads).await.map_err(|e| {
            tracing::error!(error = %e, "Batch upload aborted");
            e
        })?;

        tracing::debug!(uploaded = urls.len(), "Batch upload completed");
        Ok(urls)
    }

    /// Delete the stored object behind a public URL.
    ///
    /// Strategies are tried in `DeleteStrategy::ORDERED` order. A missing
    /// object is `AlreadyAbsent`, but only when the listing lookup itself
    /// succeeded; otherwise an unconfirmed absence is reported as
    /// `StorageError::DeleteFailed` so the caller keeps its reference.
    #[tracing::instrument(skip(self))]
    pub async fn delete_by_url(&self, url: &str) -> StorageResult<DeleteOutcome> {
        let (store, url_endpoint) = match self.backend {
            Backend::Configured {
                ref store,
                ref url_endpoint,
            } => (store, url_endpoint),
            Backend::Degraded { ref reason } => {
                if url == self.placeholder_url {
                    return Ok(DeleteOutcome::AlreadyAbsent);
                }
                return Err(StorageError::DeleteFailed {
                    url: url.to_string(),
                    reason: format!("object store not configured: {}", reason),
                });
            }
        };

        let Some(path) = parse_store_path(url, url_endpoint) else {
            tracing::warn!(url = %url, "URL does not belong to the object store; nothing to delete");
            return Ok(DeleteOutcome::AlreadyAbsent);
        };

        let target = DeleteTarget {
            url: url.to_string(),
            path,
        };

        let mut lookup_confirmed_absent = false;
        let mut direct_confirmed_absent = false;
        let mut failures = Vec::new();

        for strategy in DeleteStrategy::ORDERED {
            match strategy
                .attempt(store.as_ref(), &target, self.call_timeout)
                .await
            {
                StrategyVerdict::Deleted { file_id } => {
                    tracing::info!(
                        url = %url,
                        file_id = %file_id,
                        strategy = %strategy,
                        backend = store.backend_name(),
                        "Stored object deleted"
                    );
                    return Ok(DeleteOutcome::Deleted { file_id, strategy });
                }
                StrategyVerdict::NotFound => {
                    tracing::debug!(url = %url, strategy = %strategy, "Strategy found no stored object");
                    match strategy {
                        DeleteStrategy::LookupByListing => lookup_confirmed_absent = true,
                        DeleteStrategy::DirectPathAsId => direct_confirmed_absent = true,
                    }
                }
                StrategyVerdict::Failed(reason) => {
                    tracing::warn!(url = %url, strategy = %strategy, reason = %reason, "Delete strategy failed");
                    failures.push(format!("{}: {}", strategy, reason));
                }
            }
        }

        if lookup_confirmed_absent && direct_confirmed_absent {
            tracing::info!(url = %url, "Stored object already absent");
            return Ok(DeleteOutcome::AlreadyAbsent);
        }

        let reason = if failures.is_empty() {
            "stored object could not be confirmed deleted".to_string()
        } else {
            failures.join("; ")
        };
        tracing::error!(url = %url, reason = %reason, "All delete strategies exhausted");
        Err(StorageError::DeleteFailed {
            url: url.to_string(),
            reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryObjectStore;

    const ENDPOINT: &str = "https://ik.imagekit.io/resort";

    fn client_for(store: &MemoryObjectStore) -> MediaStoreClient {
        MediaStoreClient::new(Arc::new(store.clone()), ENDPOINT, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn upload_returns_public_url() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let client = client_for(&store);

        let url = client
            .upload(Bytes::from_static(b"jpeg"), "/vehicles", "car.jpg", None)
            .await
            .unwrap();

        assert_eq!(url, "https://ik.imagekit.io/resort/vehicles/car.jpg");
        assert!(store.contains_url(&url));
    }

    #[tokio::test]
    async fn empty_payload_is_rejected() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let err = client_for(&store)
            .upload(Bytes::new(), "/vehicles", "car.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::EmptyPayload));
        assert_eq!(store.upload_calls(), 0);
    }

    #[tokio::test]
    async fn upload_failure_is_surfaced() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.fail_uploads_named("car.jpg");
        let err = client_for(&store)
            .upload(Bytes::from_static(b"jpeg"), "/vehicles", "car.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn upload_timeout_is_upload_failed() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.set_call_delay(Duration::from_millis(200));
        let client =
            MediaStoreClient::new(Arc::new(store.clone()), ENDPOINT, Duration::from_millis(20));
        let err = client
            .upload(Bytes::from_static(b"jpeg"), "/vehicles", "car.jpg", None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(ref msg) if msg.contains("timed out")));
    }

    #[tokio::test]
    async fn degraded_upload_returns_placeholder() {
        let client = MediaStoreClient::degraded("IMAGEKIT_PRIVATE_KEY missing", "https://placehold.co/x");
        assert!(!client.is_configured());
        let url = client
            .upload(Bytes::from_static(b"jpeg"), "/vehicles", "car.jpg", None)
            .await
            .unwrap();
        assert_eq!(url, "https://placehold.co/x");
    }

    #[tokio::test]
    async fn upload_many_preserves_input_order() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.delay_upload("first.jpg", Duration::from_millis(50));
        let client = client_for(&store);

        let urls = client
            .upload_many(
                vec![
                    UploadPayload::new(&b"1"[..], "first.jpg"),
                    UploadPayload::new(&b"2"[..], "second.jpg"),
                    UploadPayload::new(&b"3"[..], "third.jpg"),
                ],
                &UploadOptions::folder("/activities"),
            )
            .await
            .unwrap();

        assert_eq!(
            urls,
            vec![
                format!("{}/activities/first.jpg", ENDPOINT),
                format!("{}/activities/second.jpg", ENDPOINT),
                format!("{}/activities/third.jpg", ENDPOINT),
            ]
        );
    }

    #[tokio::test]
    async fn upload_many_fails_on_any_rejection() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.fail_uploads_named("bad.jpg");
        let client = client_for(&store);

        let result = client
            .upload_many(
                vec![
                    UploadPayload::new(&b"1"[..], "good.jpg"),
                    UploadPayload::new(&b"2"[..], "bad.jpg"),
                ],
                &UploadOptions::folder("/activities"),
            )
            .await;

        assert!(matches!(result, Err(StorageError::UploadFailed(_))));
    }

    #[tokio::test]
    async fn upload_many_of_nothing_is_empty() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let urls = client_for(&store)
            .upload_many(Vec::new(), &UploadOptions::folder("/activities"))
            .await
            .unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn delete_found_and_matched_uses_listing() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let file = store.insert_file("/licenses", "abc.jpg");

        let outcome = client_for(&store).delete_by_url(&file.url).await.unwrap();

        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                file_id: file.file_id.clone(),
                strategy: DeleteStrategy::LookupByListing
            }
        );
        assert_eq!(store.file_count(), 0);
        assert_eq!(store.delete_calls(), vec![file.file_id]);
    }

    #[tokio::test]
    async fn delete_found_but_mismatched_falls_back_to_path() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.accept_path_ids(true);
        let file = store.insert_file("/licenses", "abc.jpg");
        store.override_listing(vec![crate::traits::StoredFile {
            file_id: "file_other".to_string(),
            url: format!("{}/licenses/abc_x9.jpg", ENDPOINT),
            thumbnail_url: None,
            ..file.clone()
        }]);

        let outcome = client_for(&store).delete_by_url(&file.url).await.unwrap();

        assert_eq!(
            outcome,
            DeleteOutcome::Deleted {
                file_id: "licenses/abc.jpg".to_string(),
                strategy: DeleteStrategy::DirectPathAsId
            }
        );
        assert!(!store.contains_url(&file.url));
        assert!(!store.delete_calls().contains(&"file_other".to_string()));
    }

    #[tokio::test]
    async fn delete_not_found_is_already_absent() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let outcome = client_for(&store)
            .delete_by_url("https://ik.imagekit.io/resort/licenses/never-uploaded.jpg")
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn repeated_delete_is_idempotent() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let file = store.insert_file("/licenses", "abc.jpg");
        let client = client_for(&store);

        assert!(matches!(
            client.delete_by_url(&file.url).await.unwrap(),
            DeleteOutcome::Deleted { .. }
        ));
        assert_eq!(
            client.delete_by_url(&file.url).await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn unparseable_url_is_skipped() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let outcome = client_for(&store)
            .delete_by_url("https://elsewhere.example.com/photo.jpg")
            .await
            .unwrap();
        assert_eq!(outcome, DeleteOutcome::AlreadyAbsent);
        assert_eq!(store.list_calls(), 0);
        assert!(store.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn failed_deletes_preserve_url() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let file = store.insert_file("/licenses", "abc.jpg");
        store.fail_deletes_for_path("licenses/abc.jpg");

        let err = client_for(&store).delete_by_url(&file.url).await.unwrap_err();

        match err {
            StorageError::DeleteFailed { url, reason } => {
                assert_eq!(url, file.url);
                assert!(reason.contains("lookup_by_listing"));
                assert!(reason.contains("direct_path_as_id"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(store.contains_url(&file.url));
    }

    #[tokio::test]
    async fn lookup_outage_does_not_claim_absence() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let file = store.insert_file("/licenses", "abc.jpg");
        store.fail_listing(true);

        let result = client_for(&store).delete_by_url(&file.url).await;

        assert!(matches!(result, Err(StorageError::DeleteFailed { .. })));
        assert!(store.contains_url(&file.url));
    }

    #[tokio::test]
    async fn degraded_delete_keeps_reference() {
        let client = MediaStoreClient::degraded("missing keys", "https://placehold.co/x");
        assert_eq!(
            client.delete_by_url("https://placehold.co/x").await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
        assert!(matches!(
            client
                .delete_by_url("https://ik.imagekit.io/resort/licenses/a.jpg")
                .await,
            Err(StorageError::DeleteFailed { .. })
        ));
    }
}
