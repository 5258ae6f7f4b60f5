//! Ordered delete strategies for removing a stored object given only its URL.
//!
//! The store deletes by internal id while the local system persists URLs, so
//! a delete is attempted by each strategy in turn until one succeeds.

use crate::keys::{urls_match, StorePath};
use crate::traits::{ObjectStore, StorageError, StorageResult};
use resort_core::constants::FILE_LOOKUP_LIMIT;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::time::Duration;

/// A stored object to delete: the persisted URL and the path parsed from it.
#[derive(Debug, Clone)]
pub struct DeleteTarget {
    pub url: String,
    pub path: StorePath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStrategy {
    /// List the folder by file name, match the canonical or thumbnail URL, delete by file id.
    LookupByListing,
    /// Delete using the parsed path as the id; accepted by some store configurations.
    DirectPathAsId,
}

/// What a single strategy established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyVerdict {
    Deleted { file_id: String },
    /// The store confirmed there is nothing at this target.
    NotFound,
    Failed(String),
}

impl DeleteStrategy {
    /// Strategies in the order they are tried.
    pub const ORDERED: [DeleteStrategy; 2] =
        [DeleteStrategy::LookupByListing, DeleteStrategy::DirectPathAsId];

    pub fn name(&self) -> &'static str {
        match self {
            DeleteStrategy::LookupByListing => "lookup_by_listing",
            DeleteStrategy::DirectPathAsId => "direct_path_as_id",
        }
    }

    pub async fn attempt(
        &self,
        store: &dyn ObjectStore,
        target: &DeleteTarget,
        timeout: Duration,
    ) -> StrategyVerdict {
        match self {
            DeleteStrategy::LookupByListing => lookup_and_delete(store, target, timeout).await,
            DeleteStrategy::DirectPathAsId => {
                let id = target.path.relative_path();
                delete_verdict(with_timeout(timeout, store.delete_file(&id)).await, id)
            }
        }
    }
}

impl Display for DeleteStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.name())
    }
}

/// Bound a store call; expiry is reported as `StorageError::Timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> StorageResult<T>
where
    F: Future<Output = StorageResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(timeout)),
    }
}

fn delete_verdict(result: StorageResult<()>, file_id: String) -> StrategyVerdict {
    match result {
        Ok(()) => StrategyVerdict::Deleted { file_id },
        Err(StorageError::NotFound(_)) => StrategyVerdict::NotFound,
        Err(e) => StrategyVerdict::Failed(e.to_string()),
    }
}

async fn lookup_and_delete(
    store: &dyn ObjectStore,
    target: &DeleteTarget,
    timeout: Duration,
) -> StrategyVerdict {
    let listed = match with_timeout(
        timeout,
        store.list_files(&target.path.folder, &target.path.file_name, FILE_LOOKUP_LIMIT),
    )
    .await
    {
        Ok(files) => files,
        Err(e) => return StrategyVerdict::Failed(format!("lookup failed: {}", e)),
    };

    let matched = listed.into_iter().find(|file| {
        urls_match(&file.url, &target.url)
            || file
                .thumbnail_url
                .as_deref()
                .is_some_and(|thumb| urls_match(thumb, &target.url))
    });

    match matched {
        Some(file) => {
            tracing::debug!(file_id = %file.file_id, url = %target.url, "Stored file matched by listing");
            delete_verdict(
                with_timeout(timeout, store.delete_file(&file.file_id)).await,
                file.file_id,
            )
        }
        None => StrategyVerdict::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::parse_store_path;
    use crate::test_helpers::MemoryObjectStore;

    const ENDPOINT: &str = "https://ik.imagekit.io/resort";

    fn target(url: &str) -> DeleteTarget {
        DeleteTarget {
            url: url.to_string(),
            path: parse_store_path(url, ENDPOINT).unwrap(),
        }
    }

    #[tokio::test]
    async fn lookup_deletes_matching_file() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let file = store.insert_file("/licenses", "abc.jpg");

        let verdict = DeleteStrategy::LookupByListing
            .attempt(&store, &target(&file.url), Duration::from_secs(1))
            .await;

        assert_eq!(verdict, StrategyVerdict::Deleted { file_id: file.file_id });
        assert_eq!(store.file_count(), 0);
    }

    #[tokio::test]
    async fn lookup_matches_thumbnail_url() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let file = store.insert_file("/licenses", "abc.jpg");
        let thumb = file.thumbnail_url.clone().unwrap();

        let verdict = DeleteStrategy::LookupByListing
            .attempt(&store, &target(&thumb), Duration::from_secs(1))
            .await;

        assert!(matches!(verdict, StrategyVerdict::Deleted { .. }));
    }

    #[tokio::test]
    async fn lookup_with_mismatched_listing_deletes_nothing() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let other = store.insert_file("/licenses", "abc.jpg");
        store.override_listing(vec![crate::traits::StoredFile {
            url: format!("{}/licenses/abc_renamed.jpg", ENDPOINT),
            ..other
        }]);

        let verdict = DeleteStrategy::LookupByListing
            .attempt(
                &store,
                &target("https://ik.imagekit.io/resort/licenses/abc.jpg"),
                Duration::from_secs(1),
            )
            .await;

        assert_eq!(verdict, StrategyVerdict::NotFound);
        assert_eq!(store.file_count(), 1);
        assert!(store.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn lookup_failure_is_reported() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.fail_listing(true);

        let verdict = DeleteStrategy::LookupByListing
            .attempt(
                &store,
                &target("https://ik.imagekit.io/resort/licenses/abc.jpg"),
                Duration::from_secs(1),
            )
            .await;

        assert!(matches!(verdict, StrategyVerdict::Failed(ref msg) if msg.contains("lookup")));
    }

    #[tokio::test]
    async fn direct_delete_uses_relative_path() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.accept_path_ids(true);
        let file = store.insert_file("/licenses", "abc.jpg");

        let verdict = DeleteStrategy::DirectPathAsId
            .attempt(&store, &target(&file.url), Duration::from_secs(1))
            .await;

        assert_eq!(
            verdict,
            StrategyVerdict::Deleted {
                file_id: "licenses/abc.jpg".to_string()
            }
        );
        assert_eq!(store.delete_calls(), vec!["licenses/abc.jpg".to_string()]);
    }

    #[tokio::test]
    async fn direct_delete_without_path_ids_is_not_found() {
        let store = MemoryObjectStore::new(ENDPOINT);
        let verdict = DeleteStrategy::DirectPathAsId
            .attempt(
                &store,
                &target("https://ik.imagekit.io/resort/licenses/abc.jpg"),
                Duration::from_secs(1),
            )
            .await;
        assert_eq!(verdict, StrategyVerdict::NotFound);
    }

    #[tokio::test]
    async fn slow_store_call_times_out() {
        let store = MemoryObjectStore::new(ENDPOINT);
        store.set_call_delay(Duration::from_millis(200));

        let verdict = DeleteStrategy::DirectPathAsId
            .attempt(
                &store,
                &target("https://ik.imagekit.io/resort/licenses/abc.jpg"),
                Duration::from_millis(20),
            )
            .await;

        assert!(matches!(verdict, StrategyVerdict::Failed(ref msg) if msg.contains("timed out")));
    }
}
