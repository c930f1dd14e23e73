use thiserror::Error;

use crate::http_client::HttpError;

pub type GatewayResult<T> = Result<T, GatewayError>;

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Credentials for this gateway are missing from settings. Callers
    /// treat this as a soft failure (test-mode fallback), not a crash.
    #[error("gateway '{gateway}' is not configured")]
    NotConfigured { gateway: String },

    #[error("gateway request invalid: {message}")]
    Validation { message: String },

    #[error("gateway network failure: {message}")]
    Network { message: String, retryable: bool },

    #[error("gateway '{gateway}' rejected the request: {message}")]
    Provider {
        gateway: String,
        message: String,
        provider_code: Option<String>,
        retryable: bool,
    },

    #[error("gateway request timed out")]
    Timeout,
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Network { retryable, .. } => *retryable,
            GatewayError::Provider { retryable, .. } => *retryable,
            GatewayError::Timeout => true,
            _ => false,
        }
    }

    pub fn from_http(gateway: &str, error: HttpError) -> Self {
        match error {
            HttpError::Network { message } if message.contains("timed out") => GatewayError::Timeout,
            HttpError::Network { message } => GatewayError::Network {
                message,
                retryable: true,
            },
            HttpError::RateLimited => GatewayError::Provider {
                gateway: gateway.to_string(),
                message: "rate limited".to_string(),
                provider_code: None,
                retryable: true,
            },
            HttpError::Status { status, body } => GatewayError::Provider {
                gateway: gateway.to_string(),
                message: body,
                provider_code: Some(status.to_string()),
                retryable: status >= 500,
            },
            HttpError::Decode { message } => GatewayError::Provider {
                gateway: gateway.to_string(),
                message: format!("unparseable response: {message}"),
                provider_code: None,
                retryable: false,
            },
        }
    }
}
