//! Configuration module
//!
//! This module provides configuration for the media lifecycle services:
//! database access, the remote object store, the retention sweeper and image
//! collection writes. Values come from the process environment (optionally
//! seeded from a `.env` file) with defaults for everything but credentials.

use std::env;

use crate::constants::{
    DEFAULT_IMAGEKIT_API_BASE, DEFAULT_IMAGEKIT_UPLOAD_BASE, DEFAULT_IMAGE_WRITE_MAX_ATTEMPTS,
    DEFAULT_LICENSE_UPLOAD_FOLDER, DEFAULT_OBJECT_STORE_TIMEOUT_SECS,
    DEFAULT_RETENTION_ALERT_AFTER_FAILURES, DEFAULT_RETENTION_CALL_TIMEOUT_SECS,
    DEFAULT_RETENTION_INTERVAL_SECS, DEFAULT_RETENTION_WINDOW_DAYS, DELETE_STORE_CALLS,
    PLACEHOLDER_IMAGE_URL,
};

const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Credential values shipped in sample `.env` files that must never be sent to the store.
const PLACEHOLDER_MARKERS: &[&str] = &["your_", "your-", "changeme", "change_me", "placeholder", "xxx"];

/// Base configuration shared by every binary
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub environment: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
}

/// Remote object store (ImageKit-style API) configuration
#[derive(Clone, Debug)]
pub struct ObjectStoreConfig {
    pub public_key: Option<String>,
    pub private_key: Option<String>,
    /// Public delivery endpoint, e.g. `https://ik.imagekit.io/resort`
    pub url_endpoint: Option<String>,
    pub api_base: String,
    pub upload_base: String,
    pub timeout_secs: u64,
    pub placeholder_url: String,
    /// Folder for uploaded driver's-license photos
    pub document_folder: String,
}

impl ObjectStoreConfig {
    /// Names of required credentials that are missing, blank or left at a sample value.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !is_real_credential(self.public_key.as_deref()) {
            missing.push("IMAGEKIT_PUBLIC_KEY");
        }
        if !is_real_credential(self.private_key.as_deref()) {
            missing.push("IMAGEKIT_PRIVATE_KEY");
        }
        if !is_real_credential(self.url_endpoint.as_deref()) {
            missing.push("IMAGEKIT_URL_ENDPOINT");
        }
        missing
    }

    pub fn is_configured(&self) -> bool {
        self.missing_credentials().is_empty()
    }
}

fn is_real_credential(value: Option<&str>) -> bool {
    match value.map(str::trim) {
        None | Some("") => false,
        Some(v) => {
            let lower = v.to_lowercase();
            !PLACEHOLDER_MARKERS.iter().any(|m| lower.contains(m))
        }
    }
}

/// Retention sweeper configuration
#[derive(Clone, Debug)]
pub struct RetentionConfig {
    pub window_days: i64,
    pub interval_secs: u64,
    pub call_timeout_secs: u64,
    pub alert_after_failures: i32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            window_days: DEFAULT_RETENTION_WINDOW_DAYS,
            interval_secs: DEFAULT_RETENTION_INTERVAL_SECS,
            call_timeout_secs: DEFAULT_RETENTION_CALL_TIMEOUT_SECS,
            alert_after_failures: DEFAULT_RETENTION_ALERT_AFTER_FAILURES,
        }
    }
}

#[derive(Clone, Debug)]
pub struct MediaLifecycleConfig {
    pub base: BaseConfig,
    pub object_store: ObjectStoreConfig,
    pub retention: RetentionConfig,
    pub image_write_max_attempts: u32,
}

/// Application configuration (media lifecycle).
#[derive(Clone, Debug)]
pub struct Config(pub Box<MediaLifecycleConfig>);

impl Config {
    fn as_lifecycle(&self) -> &MediaLifecycleConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.as_lifecycle().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = MediaLifecycleConfig::from_lookup(lookup)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_lifecycle().validate()
    }

    pub fn environment(&self) -> &str {
        &self.as_lifecycle().base.environment
    }

    pub fn database_url(&self) -> Option<&str> {
        self.as_lifecycle().base.database_url.as_deref()
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_lifecycle().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_lifecycle().base.db_timeout_seconds
    }

    pub fn object_store(&self) -> &ObjectStoreConfig {
        &self.as_lifecycle().object_store
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.as_lifecycle().retention
    }

    pub fn image_write_max_attempts(&self) -> u32 {
        self.as_lifecycle().image_write_max_attempts
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl MediaLifecycleConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let base = BaseConfig {
            environment,
            database_url: lookup("DATABASE_URL"),
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_or(&lookup, "DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
        };

        let object_store = ObjectStoreConfig {
            public_key: lookup("IMAGEKIT_PUBLIC_KEY"),
            private_key: lookup("IMAGEKIT_PRIVATE_KEY"),
            url_endpoint: lookup("IMAGEKIT_URL_ENDPOINT")
                .map(|s| s.trim().trim_end_matches('/').to_string()),
            api_base: lookup("IMAGEKIT_API_BASE")
                .unwrap_or_else(|| DEFAULT_IMAGEKIT_API_BASE.to_string()),
            upload_base: lookup("IMAGEKIT_UPLOAD_BASE")
                .unwrap_or_else(|| DEFAULT_IMAGEKIT_UPLOAD_BASE.to_string()),
            timeout_secs: parse_or(
                &lookup,
                "OBJECT_STORE_TIMEOUT_SECS",
                DEFAULT_OBJECT_STORE_TIMEOUT_SECS,
            ),
            placeholder_url: lookup("PLACEHOLDER_IMAGE_URL")
                .unwrap_or_else(|| PLACEHOLDER_IMAGE_URL.to_string()),
            document_folder: lookup("LICENSE_UPLOAD_FOLDER")
                .unwrap_or_else(|| DEFAULT_LICENSE_UPLOAD_FOLDER.to_string()),
        };

        let retention = RetentionConfig {
            window_days: parse_or(&lookup, "RETENTION_WINDOW_DAYS", DEFAULT_RETENTION_WINDOW_DAYS),
            interval_secs: parse_or(
                &lookup,
                "RETENTION_INTERVAL_SECS",
                DEFAULT_RETENTION_INTERVAL_SECS,
            ),
            call_timeout_secs: parse_or(
                &lookup,
                "RETENTION_CALL_TIMEOUT_SECS",
                DEFAULT_RETENTION_CALL_TIMEOUT_SECS
                    .max(DELETE_STORE_CALLS.saturating_mul(object_store.timeout_secs)),
            ),
            alert_after_failures: parse_or(
                &lookup,
                "RETENTION_ALERT_AFTER_FAILURES",
                DEFAULT_RETENTION_ALERT_AFTER_FAILURES,
            ),
        };

        Ok(MediaLifecycleConfig {
            base,
            object_store,
            retention,
            image_write_max_attempts: parse_or(
                &lookup,
                "IMAGE_WRITE_MAX_ATTEMPTS",
                DEFAULT_IMAGE_WRITE_MAX_ATTEMPTS,
            ),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if let Some(ref url) = self.base.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow::anyhow!(
                    "DATABASE_URL must be a valid PostgreSQL connection string"
                ));
            }
        }

        if self.retention.window_days <= 0 {
            return Err(anyhow::anyhow!("RETENTION_WINDOW_DAYS must be positive"));
        }

        if self.retention.interval_secs == 0 {
            return Err(anyhow::anyhow!("RETENTION_INTERVAL_SECS must be positive"));
        }

        if self.retention.call_timeout_secs == 0 || self.object_store.timeout_secs == 0 {
            return Err(anyhow::anyhow!(
                "RETENTION_CALL_TIMEOUT_SECS and OBJECT_STORE_TIMEOUT_SECS must be positive"
            ));
        }

        let delete_budget = DELETE_STORE_CALLS.saturating_mul(self.object_store.timeout_secs);
        if self.retention.call_timeout_secs < delete_budget {
            return Err(anyhow::anyhow!(
                "RETENTION_CALL_TIMEOUT_SECS ({}) must cover {} object store calls of OBJECT_STORE_TIMEOUT_SECS ({}); use at least {}",
                self.retention.call_timeout_secs,
                DELETE_STORE_CALLS,
                self.object_store.timeout_secs,
                delete_budget
            ));
        }

        if self.image_write_max_attempts == 0 {
            return Err(anyhow::anyhow!("IMAGE_WRITE_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn defaults_apply_when_environment_is_empty() {
        let config = config_from(&[]);
        assert_eq!(config.environment(), "development");
        assert!(!config.is_production());
        assert_eq!(config.retention().window_days, 20);
        assert_eq!(config.retention().interval_secs, 86_400);
        assert_eq!(config.image_write_max_attempts(), 3);
        assert_eq!(config.object_store().placeholder_url, PLACEHOLDER_IMAGE_URL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_credentials_are_reported() {
        let config = config_from(&[("IMAGEKIT_PUBLIC_KEY", "public_abc")]);
        let missing = config.object_store().missing_credentials();
        assert_eq!(missing, vec!["IMAGEKIT_PRIVATE_KEY", "IMAGEKIT_URL_ENDPOINT"]);
        assert!(!config.object_store().is_configured());
    }

    #[test]
    fn sample_credentials_count_as_missing() {
        let config = config_from(&[
            ("IMAGEKIT_PUBLIC_KEY", "your_public_key"),
            ("IMAGEKIT_PRIVATE_KEY", "   "),
            ("IMAGEKIT_URL_ENDPOINT", "https://ik.imagekit.io/your_imagekit_id"),
        ]);
        assert_eq!(config.object_store().missing_credentials().len(), 3);
    }

    #[test]
    fn real_credentials_configure_the_store() {
        let config = config_from(&[
            ("IMAGEKIT_PUBLIC_KEY", "public_Ab12"),
            ("IMAGEKIT_PRIVATE_KEY", "private_Cd34"),
            ("IMAGEKIT_URL_ENDPOINT", "https://ik.imagekit.io/resort/"),
        ]);
        assert!(config.object_store().is_configured());
        assert_eq!(
            config.object_store().url_endpoint.as_deref(),
            Some("https://ik.imagekit.io/resort")
        );
    }

    #[test]
    fn production_detected_from_app_env() {
        let config = config_from(&[("APP_ENV", "Prod")]);
        assert!(config.is_production());
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let config = config_from(&[("RETENTION_WINDOW_DAYS", "twenty")]);
        assert_eq!(config.retention().window_days, 20);
    }

    #[test]
    fn retention_timeout_defaults_cover_a_full_delete() {
        let config = config_from(&[]);
        assert_eq!(config.retention().call_timeout_secs, 90);
        assert!(config.validate().is_ok());

        let config = config_from(&[("OBJECT_STORE_TIMEOUT_SECS", "50")]);
        assert_eq!(config.retention().call_timeout_secs, 150);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_retention_timeout_shorter_than_delete() {
        let config = config_from(&[
            ("RETENTION_CALL_TIMEOUT_SECS", "60"),
            ("OBJECT_STORE_TIMEOUT_SECS", "30"),
        ]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 90"));

        let config = config_from(&[
            ("RETENTION_CALL_TIMEOUT_SECS", "90"),
            ("OBJECT_STORE_TIMEOUT_SECS", "30"),
        ]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_window_and_foreign_database() {
        let config = config_from(&[("RETENTION_WINDOW_DAYS", "0")]);
        assert!(config.validate().is_err());

        let config = config_from(&[("DATABASE_URL", "mysql://localhost/resort")]);
        assert!(config.validate().is_err());
    }
}
