//! Shared blocking HTTP plumbing for the model adapters
//!
//! Every adapter posts JSON and reads JSON back. Communication failures,
//! `429` and `5xx` answers are retried with exponential backoff; any other
//! non-success status fails immediately.

use crate::LlmError;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Build a client with JSON headers and an optional bearer token
pub(crate) fn build_client(api_key: &str, timeout: Duration) -> Result<Client, LlmError> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if !api_key.trim().is_empty() {
        let auth = format!("Bearer {}", api_key.trim());
        let value = HeaderValue::from_str(&auth)
            .map_err(|e| LlmError::Other(format!("Invalid API key header: {}", e)))?;
        headers.insert(AUTHORIZATION, value);
    }

    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| LlmError::Communication(format!("Failed to build HTTP client: {}", e)))
}

/// Join a base URL and a path without doubling slashes
pub(crate) fn endpoint_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// POST `body` to `url` and decode the JSON answer
pub(crate) fn post_json<B, R>(
    client: &Client,
    url: &str,
    body: &B,
    model: &str,
    max_retries: u32,
) -> Result<R, LlmError>
where
    B: Serialize,
    R: DeserializeOwned,
{
    let attempts_allowed = max_retries.max(1);
    let mut attempts = 0;
    let mut last_error = None;

    while attempts < attempts_allowed {
        match client.post(url).json(body).send() {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<R>().map_err(|e| {
                        LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                    });
                }
                if status == StatusCode::NOT_FOUND {
                    return Err(LlmError::ModelNotAvailable(model.to_string()));
                }

                let error_text = response
                    .text()
                    .unwrap_or_else(|_| "Unknown error".to_string());
                if status == StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(LlmError::RateLimitExceeded);
                } else if status.is_server_error() {
                    last_error = Some(LlmError::Communication(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                } else {
                    return Err(LlmError::Communication(format!(
                        "HTTP {}: {}",
                        status, error_text
                    )));
                }
            }
            Err(e) => {
                last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
            }
        }

        attempts += 1;
        if attempts < attempts_allowed {
            // Exponential backoff: 1s, 2s, 4s, etc.
            let delay = Duration::from_secs(2u64.pow(attempts - 1));
            warn!("Request to {} failed, retrying in {:?}", url, delay);
            thread::sleep(delay);
        }
    }

    Err(last_error
        .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
}
