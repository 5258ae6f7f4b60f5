use crate::client::MediaStoreClient;
use crate::imagekit::ImageKitStore;
use crate::{StorageError, StorageResult};
use resort_core::Config;
use std::sync::Arc;
use std::time::Duration;

/// Create the media store client based on configuration
///
/// Missing credentials are fatal in production. Elsewhere the client falls
/// back to degraded mode and hands out the placeholder URL.
pub fn create_object_store(config: &Config) -> StorageResult<MediaStoreClient> {
    let store_config = config.object_store();
    let missing = store_config.missing_credentials();

    if !missing.is_empty() {
        let reason = format!("missing credentials: {}", missing.join(", "));
        if config.is_production() {
            return Err(StorageError::ConfigError(format!(
                "object store misconfigured in production ({})",
                reason
            )));
        }
        return Ok(MediaStoreClient::degraded(
            reason,
            store_config.placeholder_url.clone(),
        ));
    }

    let url_endpoint = store_config.url_endpoint.clone().ok_or_else(|| {
        StorageError::ConfigError("IMAGEKIT_URL_ENDPOINT not configured".to_string())
    })?;
    let store = ImageKitStore::from_config(store_config)?;

    tracing::info!(
        url_endpoint = %url_endpoint,
        timeout_secs = store_config.timeout_secs,
        "Object store client configured"
    );

    Ok(MediaStoreClient::new(
        Arc::new(store),
        url_endpoint,
        Duration::from_secs(store_config.timeout_secs),
    )
    .with_placeholder_url(store_config.placeholder_url.clone()))
}
