use crate::keys::normalize_folder;
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredFile, UploadObject};
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use resort_core::ObjectStoreConfig;
use serde::Deserialize;
use serde_json::json;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

/// Characters escaped when an id is placed in a URL path segment.
const FILE_ID_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'?');

/// ImageKit-style remote image host
///
/// Talks to the management API (`{api_base}/v1/files`) and the upload API
/// (`{upload_base}/api/v1/files/upload`) with HTTP basic auth on the private key.
#[derive(Clone)]
pub struct ImageKitStore {
    http_client: reqwest::Client,
    private_key: String,
    api_base: String,
    upload_base: String,
}

impl Debug for ImageKitStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ImageKitStore")
            .field("api_base", &self.api_base)
            .field("upload_base", &self.upload_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_id: String,
    name: String,
    url: String,
    #[serde(default)]
    thumbnail_url: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListItem {
    file_id: String,
    name: String,
    url: String,
    #[serde(default, alias = "thumbnailUrl")]
    thumbnail: Option<String>,
    #[serde(default)]
    file_path: Option<String>,
}

impl From<UploadResponse> for StoredFile {
    fn from(r: UploadResponse) -> Self {
        StoredFile {
            file_id: r.file_id,
            name: r.name,
            url: r.url,
            thumbnail_url: r.thumbnail_url,
            file_path: r.file_path,
        }
    }
}

impl From<FileListItem> for StoredFile {
    fn from(r: FileListItem) -> Self {
        StoredFile {
            file_id: r.file_id,
            name: r.name,
            url: r.url,
            thumbnail_url: r.thumbnail,
            file_path: r.file_path,
        }
    }
}

impl ImageKitStore {
    /// Create a new ImageKitStore
    ///
    /// # Arguments
    /// * `private_key` - API private key (basic auth username)
    /// * `api_base` - Management API base, e.g. "https://api.imagekit.io"
    /// * `upload_base` - Upload API base, e.g. "https://upload.imagekit.io"
    /// * `timeout` - Per-request timeout applied by the HTTP client
    pub fn new(
        private_key: String,
        api_base: String,
        upload_base: String,
        timeout: Duration,
    ) -> StorageResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                StorageError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            http_client,
            private_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            upload_base: upload_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ObjectStoreConfig) -> StorageResult<Self> {
        let private_key = config
            .private_key
            .clone()
            .ok_or_else(|| {
                StorageError::ConfigError("IMAGEKIT_PRIVATE_KEY not configured".to_string())
            })?;

        Self::new(
            private_key,
            config.api_base.clone(),
            config.upload_base.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn map_send_error(e: reqwest::Error, timeout_hint: Duration) -> StorageError {
        if e.is_timeout() {
            StorageError::Timeout(timeout_hint)
        } else {
            StorageError::BackendError(e.to_string())
        }
    }

    async fn error_body(response: reqwest::Response) -> String {
        response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string())
    }
}

#[async_trait]
impl ObjectStore for ImageKitStore {
    #[tracing::instrument(skip(self, object), fields(
        store.operation = "upload",
        store.folder = %object.folder,
        store.file_name = %object.file_name,
        store.size = object.data.len()
    ))]
    async fn upload(&self, object: UploadObject) -> StorageResult<StoredFile> {
        let start = std::time::Instant::now();
        let url = format!("{}/api/v1/files/upload", self.upload_base);

        let part = reqwest::multipart::Part::bytes(object.data.to_vec())
            .file_name(object.file_name.clone());
        let mut form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("fileName", object.file_name.clone())
            .text("folder", normalize_folder(&object.folder))
            .text("useUniqueFileName", "true");
        if let Some(ref transform) = object.transform {
            form = form.text("transformation", json!({ "pre": transform.as_str() }).to_string());
        }

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(|e| match Self::map_send_error(e, start.elapsed()) {
                StorageError::BackendError(msg) => StorageError::UploadFailed(msg),
                other => other,
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = Self::error_body(response).await;
            tracing::error!(
                status = %status,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Image upload rejected by store"
            );
            return Err(StorageError::UploadFailed(format!(
                "{} - {}",
                status, error_text
            )));
        }

        let uploaded: UploadResponse = response
            .json()
            .await
            .map_err(|e| StorageError::UploadFailed(format!("Invalid upload response: {}", e)))?;

        tracing::info!(
            file_id = %uploaded.file_id,
            url = %uploaded.url,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Image upload successful"
        );

        Ok(uploaded.into())
    }

    #[tracing::instrument(skip(self), fields(store.operation = "list"))]
    async fn list_files(
        &self,
        folder: &str,
        file_name: &str,
        limit: usize,
    ) -> StorageResult<Vec<StoredFile>> {
        let start = std::time::Instant::now();
        let url = format!("{}/v1/files", self.api_base);
        let search_query = format!("name = \"{}\"", file_name.replace('"', "\\\""));
        let limit = limit.to_string();
        let folder = normalize_folder(folder);

        let response = self
            .http_client
            .get(&url)
            .basic_auth(&self.private_key, Some(""))
            .query(&[
                ("path", folder.as_str()),
                ("searchQuery", search_query.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, start.elapsed()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = Self::error_body(response).await;
            return Err(StorageError::BackendError(format!(
                "File listing failed: {} - {}",
                status, error_text
            )));
        }

        let items: Vec<FileListItem> = response
            .json()
            .await
            .map_err(|e| StorageError::BackendError(format!("Invalid listing response: {}", e)))?;

        tracing::debug!(
            matches = items.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "File listing completed"
        );

        Ok(items.into_iter().map(StoredFile::from).collect())
    }

    #[tracing::instrument(skip(self), fields(store.operation = "delete"))]
    async fn delete_file(&self, file_id: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();
        let url = format!(
            "{}/v1/files/{}",
            self.api_base,
            utf8_percent_encode(file_id, FILE_ID_ESCAPES)
        );

        let response = self
            .http_client
            .delete(&url)
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await
            .map_err(|e| Self::map_send_error(e, start.elapsed()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound(file_id.to_string()));
        }
        if !status.is_success() {
            let error_text = Self::error_body(response).await;
            return Err(StorageError::BackendError(format!(
                "Delete failed: {} - {}",
                status, error_text
            )));
        }

        tracing::info!(
            file_id = %file_id,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Stored file deleted"
        );

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "imagekit"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use mockito::Matcher;

    fn store_for(server: &mockito::ServerGuard) -> ImageKitStore {
        ImageKitStore::new(
            "private_test".to_string(),
            server.url(),
            server.url(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn upload_returns_stored_file() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v1/files/upload")
            .match_header("authorization", Matcher::Regex("^Basic ".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"fileId":"f_123","name":"car_x1.jpg","url":"https://ik.imagekit.io/resort/vehicles/car_x1.jpg","thumbnailUrl":"https://ik.imagekit.io/resort/tr:n-ik_ml_thumbnail/vehicles/car_x1.jpg","filePath":"/vehicles/car_x1.jpg"}"#,
            )
            .create_async()
            .await;

        let store = store_for(&server);
        let stored = store
            .upload(UploadObject {
                data: Bytes::from_static(b"jpeg-bytes"),
                folder: "vehicles".to_string(),
                file_name: "car.jpg".to_string(),
                transform: None,
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(stored.file_id, "f_123");
        assert_eq!(stored.url, "https://ik.imagekit.io/resort/vehicles/car_x1.jpg");
        assert_eq!(stored.file_path.as_deref(), Some("/vehicles/car_x1.jpg"));
    }

    #[tokio::test]
    async fn upload_error_status_is_upload_failed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/v1/files/upload")
            .with_status(500)
            .with_body("internal")
            .create_async()
            .await;

        let store = store_for(&server);
        let err = store
            .upload(UploadObject {
                data: Bytes::from_static(b"x"),
                folder: "/".to_string(),
                file_name: "a.jpg".to_string(),
                transform: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::UploadFailed(ref msg) if msg.contains("500")));
    }

    #[tokio::test]
    async fn list_files_queries_folder_and_name() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("path".to_string(), "/licenses".to_string()),
                Matcher::UrlEncoded("searchQuery".to_string(), "name = \"abc.jpg\"".to_string()),
                Matcher::UrlEncoded("limit".to_string(), "10".to_string()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"fileId":"f_1","name":"abc.jpg","url":"https://ik.imagekit.io/resort/licenses/abc.jpg","thumbnail":"https://ik.imagekit.io/resort/tr:n-ik_ml_thumbnail/licenses/abc.jpg","filePath":"/licenses/abc.jpg"}]"#,
            )
            .create_async()
            .await;

        let store = store_for(&server);
        let files = store.list_files("licenses", "abc.jpg", 10).await.unwrap();

        mock.assert_async().await;
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].file_id, "f_1");
        assert!(files[0].thumbnail_url.is_some());
    }

    #[tokio::test]
    async fn delete_maps_404_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/v1/files/missing")
            .with_status(404)
            .create_async()
            .await;

        let store = store_for(&server);
        let err = store.delete_file("missing").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_success_and_server_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("DELETE", "/v1/files/f_1")
            .with_status(204)
            .create_async()
            .await;
        server
            .mock("DELETE", "/v1/files/f_2")
            .with_status(503)
            .with_body("unavailable")
            .create_async()
            .await;

        let store = store_for(&server);
        assert!(store.delete_file("f_1").await.is_ok());
        let err = store.delete_file("f_2").await.unwrap_err();
        assert!(matches!(err, StorageError::BackendError(ref msg) if msg.contains("503")));
    }

    #[tokio::test]
    async fn delete_encodes_path_ids() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/v1/files/licenses%2Fabc.jpg")
            .with_status(204)
            .create_async()
            .await;

        let store = store_for(&server);
        store.delete_file("licenses/abc.jpg").await.unwrap();
        mock.assert_async().await;
    }
}
