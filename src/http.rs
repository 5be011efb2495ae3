//! HTTP client configuration shared by the local model backends.

use crate::error::{EarshotError, Result};
use std::time::Duration;

/// Default timeout for backend requests.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Create an HTTP client with the default timeout.
pub fn create_client() -> Result<reqwest::Client> {
    create_client_with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
}

/// Create an HTTP client with a custom timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EarshotError::Config(format!("Failed to create HTTP client: {}", e)))
}

/// Join a base URL and an API path without doubling slashes.
pub fn endpoint(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
