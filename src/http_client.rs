//! Outbound HTTP client shared by the gateway adapters and the sheet store.
//!
//! Thin wrapper over reqwest with a bounded per-request timeout and
//! exponential backoff on 429/5xx. Every external call in this service goes
//! through here so the timeout policy lives in one place.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("rate limit exceeded")]
    RateLimited,

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid JSON response: {message}")]
    Decode { message: String },
}

impl HttpError {
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpError::Network { .. } | HttpError::RateLimited => true,
            HttpError::Status { status, .. } => *status >= 500,
            HttpError::Decode { .. } => false,
        }
    }
}

#[derive(Clone)]
pub struct JsonClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl JsonClient {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, HttpError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| HttpError::Network {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: Option<&str>,
        body: Option<&JsonValue>,
        additional_headers: &[(&str, &str)],
    ) -> Result<T, HttpError> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            if let Some(token) = bearer_token {
                request = request.bearer_auth(token);
            }
            for (k, v) in additional_headers {
                request = request.header(*k, *v);
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request.send().await.map_err(|e| HttpError::Network {
                message: format!("request failed: {}", e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| HttpError::Decode {
                            message: e.to_string(),
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(HttpError::RateLimited);
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "server error from upstream, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(HttpError::Status {
                        status: status.as_u16(),
                        body: text,
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(HttpError::Network {
            message: "request failed".to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(HttpError::RateLimited.is_retryable());
        assert!(HttpError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!HttpError::Status {
            status: 400,
            body: String::new()
        }
        .is_retryable());
        assert!(!HttpError::Decode {
            message: "bad".to_string()
        }
        .is_retryable());
    }
}
