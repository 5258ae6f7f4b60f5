//! Shared constants for the media lifecycle crates.

/// Stand-in image returned by uploads when the object store is not configured.
pub const PLACEHOLDER_IMAGE_URL: &str = "https://placehold.co/600x400?text=Image+Unavailable";

/// Days after the eligibility date before a sensitive document is purged.
pub const DEFAULT_RETENTION_WINDOW_DAYS: i64 = 20;

/// Once daily.
pub const DEFAULT_RETENTION_INTERVAL_SECS: u64 = 86_400;

/// Store calls a single URL delete can make: listing lookup, delete by id, direct path delete.
pub const DELETE_STORE_CALLS: u64 = 3;

pub const DEFAULT_OBJECT_STORE_TIMEOUT_SECS: u64 = 30;

/// Bound on purging one candidate; covers every store call of a delete.
pub const DEFAULT_RETENTION_CALL_TIMEOUT_SECS: u64 =
    DELETE_STORE_CALLS * DEFAULT_OBJECT_STORE_TIMEOUT_SECS;

/// Consecutive failed purges of one booking before every failure is raised as an alert.
pub const DEFAULT_RETENTION_ALERT_AFTER_FAILURES: i32 = 5;

/// Bound on read-modify-write attempts when an image list update loses an optimistic race.
pub const DEFAULT_IMAGE_WRITE_MAX_ATTEMPTS: u32 = 3;

pub const DEFAULT_IMAGEKIT_API_BASE: &str = "https://api.imagekit.io";
pub const DEFAULT_IMAGEKIT_UPLOAD_BASE: &str = "https://upload.imagekit.io";

pub const DEFAULT_LICENSE_UPLOAD_FOLDER: &str = "/licenses";

/// Page size used when looking a stored file up by folder and name.
pub const FILE_LOOKUP_LIMIT: usize = 10;
