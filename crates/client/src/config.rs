//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MARKETBAG_API_URL` - Base URL of the cart/order backend
//! - `MARKETBAG_CATALOG_URL` - Base URL of the product catalog
//! - `MARKETBAG_DATA_DIR` - Directory for the durable on-device cache
//!
//! ## Optional
//! - `MARKETBAG_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `MARKETBAG_RETRY_MAX_ATTEMPTS` - Attempts for idempotent reads (default: 3)
//! - `MARKETBAG_RETRY_BASE_DELAY_MS` - Initial backoff (default: 200)
//! - `MARKETBAG_RETRY_MAX_DELAY_MS` - Backoff cap (default: 2000)
//! - `MARKETBAG_CATALOG_CACHE_CAPACITY` - Cached products (default: 1000)
//! - `MARKETBAG_CATALOG_CACHE_TTL_SECS` - Product cache TTL (default: 300)

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Bounds for retrying idempotent reads.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles each attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
        }
    }
}

/// Marketbag client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the cart/order backend (login, /cart, /orders/*)
    pub api_base_url: String,
    /// Base URL of the product catalog (/products/{id})
    pub catalog_base_url: String,
    /// Directory holding the durable key-value cache
    pub data_dir: PathBuf,
    /// Per-request timeout
    pub request_timeout: Duration,
    /// Retry bounds for idempotent reads
    pub retry: RetryPolicy,
    /// Maximum number of cached catalog products
    pub catalog_cache_capacity: u64,
    /// Time-to-live for cached catalog products
    pub catalog_cache_ttl: Duration,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value cannot
    /// be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            api_base_url: required_env("MARKETBAG_API_URL")?,
            catalog_base_url: required_env("MARKETBAG_CATALOG_URL")?,
            data_dir: PathBuf::from(required_env("MARKETBAG_DATA_DIR")?),
            request_timeout: Duration::from_secs(optional_parsed(
                "MARKETBAG_REQUEST_TIMEOUT_SECS",
                10,
            )?),
            retry: RetryPolicy {
                max_attempts: optional_parsed("MARKETBAG_RETRY_MAX_ATTEMPTS", 3)?,
                base_delay: Duration::from_millis(optional_parsed(
                    "MARKETBAG_RETRY_BASE_DELAY_MS",
                    200,
                )?),
                max_delay: Duration::from_millis(optional_parsed(
                    "MARKETBAG_RETRY_MAX_DELAY_MS",
                    2000,
                )?),
            },
            catalog_cache_capacity: optional_parsed("MARKETBAG_CATALOG_CACHE_CAPACITY", 1000)?,
            catalog_cache_ttl: Duration::from_secs(optional_parsed(
                "MARKETBAG_CATALOG_CACHE_TTL_SECS",
                300,
            )?),
        })
    }
}

/// Get a required environment variable.
fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

/// Get an optional environment variable, parsed, with a default.
fn optional_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidEnvVar(name.to_string(), value)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_var_is_reported_by_name() {
        let err = required_env("MARKETBAG_DOES_NOT_EXIST").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: MARKETBAG_DOES_NOT_EXIST"
        );
    }

    #[test]
    fn optional_parsed_falls_back_to_default() {
        let value: u64 = optional_parsed("MARKETBAG_ALSO_NOT_SET", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert!(policy.base_delay < policy.max_delay);
    }
}
