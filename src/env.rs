//! Environment variable names used by [`crate::config::ShipperConfig::from_env`].
//!
//! These are purely helpers; the shipper itself never reads the process
//! environment.

/// Collector URL. Absent or empty disables remote delivery.
pub const REST_LOG_URL_ENV: &str = "REST_LOG_URL";

/// Seconds between timer-driven delivery cycles.
pub const REST_LOG_BATCH_INTERVAL_ENV: &str = "REST_LOG_BATCH_INTERVAL_SECONDS";

/// Seconds before an in-flight delivery request is cancelled.
pub const REST_LOG_TIMEOUT_ENV: &str = "REST_LOG_TIMEOUT_SECONDS";

/// Lowest severity queued for remote delivery, e.g. `Warning`.
pub const REST_LOG_MIN_LEVEL_ENV: &str = "REST_LOG_MIN_LEVEL";

/// `Development`, `Staging` or `Production`.
pub const REST_LOG_ENVIRONMENT_ENV: &str = "REST_LOG_ENVIRONMENT";

/// Logical service name. Required.
pub const REST_LOG_SERVICE_NAME_ENV: &str = "REST_LOG_SERVICE_NAME";

/// Service version, defaults to `unknown`.
pub const REST_LOG_SERVICE_VERSION_ENV: &str = "REST_LOG_SERVICE_VERSION";

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
