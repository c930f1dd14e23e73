use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

use crate::model::PaymentStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayName {
    Phonepe,
    Payu,
}

impl GatewayName {
    pub fn as_str(&self) -> &'static str {
        match self {
            GatewayName::Phonepe => "phonepe",
            GatewayName::Payu => "payu",
        }
    }
}

impl fmt::Display for GatewayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GatewayName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "phonepe" => Ok(GatewayName::Phonepe),
            "payu" => Ok(GatewayName::Payu),
            other => Err(format!("unknown payment gateway: {other}")),
        }
    }
}

/// Everything an adapter needs to start a payment.
#[derive(Debug, Clone)]
pub struct InitiateRequest {
    pub transaction_id: String,
    pub student_id: String,
    pub amount: BigDecimal,
    pub student_name: String,
    pub email: String,
    pub phone: String,
    pub product_info: String,
}

/// Some gateways hand back a URL to redirect to, others want the browser
/// to POST a signed form at them. `InitiateOutcome` carries whichever the
/// adapter produced.
#[derive(Debug, Clone, Serialize)]
pub struct InitiateOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form_post: Option<FormPost>,
}

impl InitiateOutcome {
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            redirect_url: Some(url.into()),
            form_post: None,
        }
    }

    pub fn form(form: FormPost) -> Self {
        Self {
            redirect_url: None,
            form_post: Some(form),
        }
    }
}

/// A browser-submitted form: action URL plus signed fields. BTreeMap keeps
/// field order stable in responses and logs.
#[derive(Debug, Clone, Serialize)]
pub struct FormPost {
    pub action: String,
    pub fields: BTreeMap<String, String>,
}

/// Outcome of checking a callback signature. Invalid payloads never error;
/// they come back as `valid: false` with a reason for the log line.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub valid: bool,
    pub reason: Option<String>,
}

impl VerificationResult {
    pub fn ok() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// A gateway callback reduced to the fields reconciliation cares about.
#[derive(Debug, Clone)]
pub struct CallbackEvent {
    pub gateway: GatewayName,
    pub transaction_id: String,
    pub provider_reference: Option<String>,
    pub provider_status: String,
    pub amount: Option<String>,
}

/// Result of a server-initiated status poll.
#[derive(Debug, Clone)]
pub struct StatusOutcome {
    pub provider_status: Option<String>,
    pub status: Option<PaymentStatus>,
    pub raw: JsonValue,
}

/// Browser destinations after a payment attempt, derived from the site
/// origin.
#[derive(Debug, Clone)]
pub struct RedirectUrls {
    pub success: String,
    pub failure: String,
    pub callback: String,
}

impl RedirectUrls {
    pub fn from_origin(origin: &str) -> Self {
        let origin = if origin.trim().is_empty() {
            warn!("site origin is not configured, redirect URLs will point at localhost");
            "http://localhost:3000"
        } else {
            origin.trim_end_matches('/')
        };
        Self {
            success: format!("{origin}/payment/success"),
            failure: format!("{origin}/payment/failure"),
            callback: format!("{origin}/api/payment/callback"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_name_parses_case_insensitively() {
        assert_eq!("PhonePe".parse::<GatewayName>().unwrap(), GatewayName::Phonepe);
        assert_eq!(" payu ".parse::<GatewayName>().unwrap(), GatewayName::Payu);
        assert!("stripe".parse::<GatewayName>().is_err());
    }

    #[test]
    fn redirect_urls_strip_trailing_slash() {
        let urls = RedirectUrls::from_origin("https://example.org/");
        assert_eq!(urls.success, "https://example.org/payment/success");
        assert_eq!(urls.callback, "https://example.org/api/payment/callback");
    }
}
