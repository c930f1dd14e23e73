//! Unified error handling for the scholarship backend.
//!
//! One `AppError` type with HTTP status mapping, machine-readable error
//! codes and user-facing messages. Handlers return `AppResult<T>` and rely
//! on the `IntoResponse` impl in `middleware::error`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic client handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Client errors (4xx)
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,

    // Infrastructure errors (5xx)
    #[serde(rename = "STORAGE_UNAVAILABLE")]
    StorageUnavailable,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 504)
    #[serde(rename = "GATEWAY_ERROR")]
    GatewayError,
    #[serde(rename = "GATEWAY_TIMEOUT")]
    GatewayTimeout,

    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Client input problems. Intake reports only the first violating field.
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Required field missing or blank
    MissingField { field: String },
    /// Email does not match the local@domain.tld shape
    InvalidEmail,
    /// Mobile number is not exactly 10 ASCII digits
    InvalidMobile { field: String },
    /// Pincode is not exactly 6 ASCII digits
    InvalidPincode,
    /// Numeric field outside its inclusive range
    OutOfRange {
        field: String,
        min: String,
        max: String,
    },
    /// Request body has an unrecognized or malformed shape
    MalformedPayload { reason: String },
}

/// Callback authenticity failures. Deliberately terse messages: the
/// response never says which part of the check failed.
#[derive(Debug, Clone)]
pub enum AuthenticationError {
    MissingSignature,
    InvalidSignature,
}

/// Infrastructure failures local to this service.
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Every configured store rejected the write or read
    StorageUnavailable { message: String },
    /// Missing or invalid configuration discovered at runtime
    Configuration { message: String },
}

/// Failures of external collaborators (payment gateways).
#[derive(Debug, Clone)]
pub enum ExternalError {
    Gateway {
        gateway: String,
        message: String,
        is_retryable: bool,
    },
    Timeout {
        service: String,
        timeout_secs: u64,
    },
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Validation(ValidationError),
    Authentication(AuthenticationError),
    NotFound { transaction_id: String },
    Infrastructure(InfrastructureError),
    External(ExternalError),
}

/// Unified application error.
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MissingField {
            field: field.into(),
        }))
    }

    pub fn invalid_email() -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidEmail))
    }

    pub fn invalid_mobile(field: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidMobile {
            field: field.into(),
        }))
    }

    pub fn invalid_pincode() -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::InvalidPincode))
    }

    pub fn out_of_range(field: impl Into<String>, min: f64, max: f64) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::OutOfRange {
            field: field.into(),
            min: min.to_string(),
            max: max.to_string(),
        }))
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation(ValidationError::MalformedPayload {
            reason: reason.into(),
        }))
    }

    pub fn invalid_signature() -> Self {
        Self::new(AppErrorKind::Authentication(
            AuthenticationError::InvalidSignature,
        ))
    }

    pub fn missing_signature() -> Self {
        Self::new(AppErrorKind::Authentication(
            AuthenticationError::MissingSignature,
        ))
    }

    pub fn storage_unavailable(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::StorageUnavailable {
                message: message.into(),
            },
        ))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn gateway(gateway: impl Into<String>, message: impl Into<String>, is_retryable: bool) -> Self {
        Self::new(AppErrorKind::External(ExternalError::Gateway {
            gateway: gateway.into(),
            message: message.into(),
            is_retryable,
        }))
    }

    pub fn gateway_timeout(service: impl Into<String>) -> Self {
        Self::new(AppErrorKind::External(ExternalError::Timeout {
            service: service.into(),
            timeout_secs: crate::gateways::factory::DEFAULT_GATEWAY_TIMEOUT_SECS,
        }))
    }

    pub fn not_found(transaction_id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::NotFound {
            transaction_id: transaction_id.into(),
        })
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code.
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Validation(_) => 400,
            // The existing flow answers signature failures with a plain 400,
            // not a 401, so clients cannot distinguish auth from shape errors.
            AppErrorKind::Authentication(_) => 400,
            AppErrorKind::NotFound { .. } => 404,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::StorageUnavailable { .. } => 503,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { .. } => 502,
                ExternalError::Timeout { .. } => 504,
            },
        }
    }

    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
            AppErrorKind::Authentication(_) => ErrorCode::InvalidSignature,
            AppErrorKind::NotFound { .. } => ErrorCode::TransactionNotFound,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::StorageUnavailable { .. } => ErrorCode::StorageUnavailable,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { .. } => ErrorCode::GatewayError,
                ExternalError::Timeout { .. } => ErrorCode::GatewayTimeout,
            },
        }
    }

    /// User-facing message. First violating field for validation errors,
    /// deliberately vague for authentication failures.
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Validation(err) => match err {
                ValidationError::MissingField { field } => format!("{} is required", field),
                ValidationError::InvalidEmail => "Invalid email format".to_string(),
                ValidationError::InvalidMobile { field } => {
                    format!("{} must be 10 digits", field)
                }
                ValidationError::InvalidPincode => "Pincode must be 6 digits".to_string(),
                ValidationError::OutOfRange { field, min, max } => {
                    format!("{} must be between {} and {}", field, min, max)
                }
                ValidationError::MalformedPayload { reason } => reason.clone(),
            },
            AppErrorKind::Authentication(err) => match err {
                AuthenticationError::MissingSignature => "Missing hash".to_string(),
                AuthenticationError::InvalidSignature => "Invalid hash".to_string(),
            },
            AppErrorKind::NotFound { transaction_id } => {
                format!("Transaction '{}' not found", transaction_id)
            }
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::StorageUnavailable { .. } => {
                    "Application storage is temporarily unavailable. Please try again later"
                        .to_string()
                }
                InfrastructureError::Configuration { .. } => {
                    "Server configuration error".to_string()
                }
            },
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { is_retryable, .. } => {
                    if *is_retryable {
                        "Payment gateway is temporarily unavailable. Please try again".to_string()
                    } else {
                        "Payment gateway returned an error".to_string()
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => format!(
                    "{} request timed out after {} seconds",
                    service, timeout_secs
                ),
            },
        }
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Validation(_) | AppErrorKind::Authentication(_) => false,
            AppErrorKind::NotFound { .. } => false,
            AppErrorKind::Infrastructure(err) => {
                matches!(err, InfrastructureError::StorageUnavailable { .. })
            }
            AppErrorKind::External(err) => match err {
                ExternalError::Gateway { is_retryable, .. } => *is_retryable,
                ExternalError::Timeout { .. } => true,
            },
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_field_names_the_field() {
        let error = AppError::missing_field("studentMobile");
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::ValidationError);
        assert_eq!(error.user_message(), "studentMobile is required");
        assert!(!error.is_retryable());
    }

    #[test]
    fn signature_errors_do_not_leak_which_check_failed() {
        let missing = AppError::missing_signature();
        let invalid = AppError::invalid_signature();
        assert_eq!(missing.status_code(), 400);
        assert_eq!(invalid.status_code(), 400);
        assert!(!invalid.user_message().contains("salt"));
        assert!(!invalid.user_message().contains("sha"));
    }

    #[test]
    fn storage_unavailable_is_a_retryable_503() {
        let error = AppError::storage_unavailable("both stores failed");
        assert_eq!(error.status_code(), 503);
        assert_eq!(error.error_code(), ErrorCode::StorageUnavailable);
        assert!(error.is_retryable());
    }

    #[test]
    fn not_found_maps_to_404() {
        let error = AppError::not_found("TXN123");
        assert_eq!(error.status_code(), 404);
        assert!(error.user_message().contains("TXN123"));
    }
}
