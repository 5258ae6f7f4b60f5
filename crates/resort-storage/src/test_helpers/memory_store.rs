//! In-memory ObjectStore implementation for testing

use crate::keys::{normalize_folder, urls_match, StorePath};
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredFile, UploadObject};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct MemoryState {
    files: BTreeMap<String, StoredFile>,
    next_id: u64,
    listing_override: Option<Vec<StoredFile>>,
    fail_listing: bool,
    accept_path_ids: bool,
    failing_uploads: HashSet<String>,
    failing_paths: HashSet<String>,
    upload_delays: HashMap<String, Duration>,
    call_delay: Option<Duration>,
    upload_calls: usize,
    list_calls: usize,
    delete_calls: Vec<String>,
}

/// Mock object store that keeps files in memory
#[derive(Clone)]
pub struct MemoryObjectStore {
    url_endpoint: String,
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryObjectStore {
    pub fn new(url_endpoint: &str) -> Self {
        Self {
            url_endpoint: url_endpoint.trim_end_matches('/').to_string(),
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }

    pub fn url_endpoint(&self) -> &str {
        &self.url_endpoint
    }

    fn store_file(&self, state: &mut MemoryState, folder: &str, name: &str) -> StoredFile {
        state.next_id += 1;
        let path = StorePath {
            folder: normalize_folder(folder),
            file_name: name.to_string(),
        };
        let relative = path.relative_path();
        let file = StoredFile {
            file_id: format!("file_{:04}", state.next_id),
            name: name.to_string(),
            url: format!("{}/{}", self.url_endpoint, relative),
            thumbnail_url: Some(format!(
                "{}/tr:n-ik_ml_thumbnail/{}",
                self.url_endpoint, relative
            )),
            file_path: Some(format!("/{}", relative)),
        };
        state.files.insert(file.file_id.clone(), file.clone());
        file
    }

    /// Seed a file as if it had been uploaded earlier
    pub fn insert_file(&self, folder: &str, name: &str) -> StoredFile {
        let mut state = self.state.lock().unwrap();
        self.store_file(&mut state, folder, name)
    }

    /// Check whether a stored file answers to this URL
    pub fn contains_url(&self, url: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .files
            .values()
            .any(|f| urls_match(&f.url, url))
    }

    pub fn file_count(&self) -> usize {
        self.state.lock().unwrap().files.len()
    }

    /// Make every listing call fail with a backend error
    pub fn fail_listing(&self, fail: bool) {
        self.state.lock().unwrap().fail_listing = fail;
    }

    /// Accept a file's relative path as its id on delete
    pub fn accept_path_ids(&self, accept: bool) {
        self.state.lock().unwrap().accept_path_ids = accept;
    }

    /// Return these entries from every listing call instead of real matches
    pub fn override_listing(&self, files: Vec<StoredFile>) {
        self.state.lock().unwrap().listing_override = Some(files);
    }

    /// Reject uploads of this file name
    pub fn fail_uploads_named(&self, file_name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_uploads
            .insert(file_name.to_string());
    }

    /// Reject deletes of the file at this relative path (e.g. `licenses/a.jpg`)
    pub fn fail_deletes_for_path(&self, relative_path: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_paths
            .insert(relative_path.trim_start_matches('/').to_string());
    }

    /// Delay the upload of this file name
    pub fn delay_upload(&self, file_name: &str, delay: Duration) {
        self.state
            .lock()
            .unwrap()
            .upload_delays
            .insert(file_name.to_string(), delay);
    }

    /// Delay every store call
    pub fn set_call_delay(&self, delay: Duration) {
        self.state.lock().unwrap().call_delay = Some(delay);
    }

    pub fn upload_calls(&self) -> usize {
        self.state.lock().unwrap().upload_calls
    }

    pub fn list_calls(&self) -> usize {
        self.state.lock().unwrap().list_calls
    }

    /// Ids passed to `delete_file`, in call order
    pub fn delete_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    async fn pause(&self, extra: Option<Duration>) {
        let delay = {
            let state = self.state.lock().unwrap();
            match (state.call_delay, extra) {
                (Some(a), Some(b)) => Some(a + b),
                (a, b) => a.or(b),
            }
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

fn relative_path_of(file: &StoredFile) -> String {
    file.file_path
        .as_deref()
        .unwrap_or(&file.name)
        .trim_start_matches('/')
        .to_string()
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, object: UploadObject) -> StorageResult<StoredFile> {
        let extra = self
            .state
            .lock()
            .unwrap()
            .upload_delays
            .get(&object.file_name)
            .copied();
        self.pause(extra).await;

        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;
        if state.failing_uploads.contains(&object.file_name) {
            return Err(StorageError::UploadFailed(format!(
                "injected upload failure for {}",
                object.file_name
            )));
        }
        Ok(self.store_file(&mut state, &object.folder, &object.file_name))
    }

    async fn list_files(
        &self,
        folder: &str,
        file_name: &str,
        limit: usize,
    ) -> StorageResult<Vec<StoredFile>> {
        self.pause(None).await;

        let mut state = self.state.lock().unwrap();
        state.list_calls += 1;
        if state.fail_listing {
            return Err(StorageError::BackendError(
                "injected listing failure".to_string(),
            ));
        }
        if let Some(ref files) = state.listing_override {
            return Ok(files.iter().take(limit).cloned().collect());
        }

        let folder = normalize_folder(folder);
        Ok(state
            .files
            .values()
            .filter(|f| {
                f.name == file_name
                    && f.file_path
                        .as_deref()
                        .map(|p| {
                            normalize_folder(p.rsplit_once('/').map(|(d, _)| d).unwrap_or(""))
                                == folder
                        })
                        .unwrap_or(false)
            })
            .take(limit)
            .cloned()
            .collect())
    }

    async fn delete_file(&self, file_id: &str) -> StorageResult<()> {
        self.pause(None).await;

        let mut state = self.state.lock().unwrap();
        state.delete_calls.push(file_id.to_string());

        let resolved = if state.files.contains_key(file_id) {
            Some(file_id.to_string())
        } else if state.accept_path_ids {
            state
                .files
                .values()
                .find(|f| relative_path_of(f) == file_id.trim_start_matches('/'))
                .map(|f| f.file_id.clone())
        } else {
            None
        };

        let failing = state.failing_paths.contains(file_id.trim_start_matches('/'))
            || resolved
                .as_ref()
                .and_then(|id| state.files.get(id))
                .is_some_and(|f| state.failing_paths.contains(&relative_path_of(f)));
        if failing {
            return Err(StorageError::BackendError(format!(
                "injected delete failure for {}",
                file_id
            )));
        }

        match resolved {
            Some(id) => {
                state.files.remove(&id);
                Ok(())
            }
            None => Err(StorageError::NotFound(file_id.to_string())),
        }
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
