//! PayU adapter.
//!
//! Requests are signed with a SHA-512 over the pipe-delimited sequence
//! `key|txnid|amount|productinfo|firstname|email|` followed by ten empty
//! udf slots and the salt. Initiation produces a signed form for the
//! browser to POST; callbacks are verified by recomputing the same hash
//! over the echoed fields.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{info, warn};

use crate::http_client::JsonClient;
use crate::model::PaymentStatus;
use crate::settings::Settings;

use super::super::adapter::GatewayAdapter;
use super::super::error::{GatewayError, GatewayResult};
use super::super::sign::{pipe_digest, secure_eq, sha512_hex};
use super::super::types::{
    CallbackEvent, FormPost, GatewayName, InitiateOutcome, InitiateRequest, RedirectUrls,
    StatusOutcome, VerificationResult,
};

const UDF_SLOTS: usize = 10;

#[derive(Debug, Clone)]
pub struct PayuConfig {
    pub key: String,
    pub salt: String,
    pub base_url: String,
    pub redirect: RedirectUrls,
}

impl PayuConfig {
    pub fn from_settings(settings: &Settings, redirect: RedirectUrls) -> Self {
        Self {
            key: settings.payu_key.trim().to_string(),
            salt: settings.payu_salt.trim().to_string(),
            base_url: settings.payu_base_url.trim_end_matches('/').to_string(),
            redirect,
        }
    }
}

pub struct PayuAdapter {
    config: PayuConfig,
    http: JsonClient,
}

impl PayuAdapter {
    pub fn new(config: PayuConfig, timeout: Duration, max_retries: u32) -> GatewayResult<Self> {
        let http = JsonClient::new(timeout, max_retries).map_err(|e| GatewayError::Network {
            message: e.to_string(),
            retryable: false,
        })?;
        Ok(Self { config, http })
    }

    fn request_hash(
        &self,
        txnid: &str,
        amount: &str,
        productinfo: &str,
        firstname: &str,
        email: &str,
    ) -> String {
        let mut segments: Vec<&str> = vec![
            self.config.key.as_str(),
            txnid,
            amount,
            productinfo,
            firstname,
            email,
        ];
        segments.extend(std::iter::repeat("").take(UDF_SLOTS));
        pipe_digest(&segments, &self.config.salt)
    }

    fn verify_hash(&self, txnid: &str) -> String {
        sha512_hex(
            format!(
                "{}|verify_payment|{}|{}",
                self.config.key, txnid, self.config.salt
            )
            .as_bytes(),
        )
    }
}

fn field_as_string(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field_or_empty(payload: &JsonValue, name: &str) -> String {
    payload.get(name).and_then(field_as_string).unwrap_or_default()
}

#[async_trait]
impl GatewayAdapter for PayuAdapter {
    fn name(&self) -> GatewayName {
        GatewayName::Payu
    }

    fn is_configured(&self) -> bool {
        !self.config.key.is_empty() && !self.config.salt.is_empty()
    }

    async fn initiate(&self, request: &InitiateRequest) -> GatewayResult<InitiateOutcome> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured {
                gateway: self.name().to_string(),
            });
        }

        let amount = request.amount.to_string();
        let hash = self.request_hash(
            &request.transaction_id,
            &amount,
            &request.product_info,
            &request.student_name,
            &request.email,
        );

        let mut fields = BTreeMap::new();
        fields.insert("key".to_string(), self.config.key.clone());
        fields.insert("txnid".to_string(), request.transaction_id.clone());
        fields.insert("amount".to_string(), amount);
        fields.insert("productinfo".to_string(), request.product_info.clone());
        fields.insert("firstname".to_string(), request.student_name.clone());
        fields.insert("email".to_string(), request.email.clone());
        fields.insert("phone".to_string(), request.phone.clone());
        fields.insert("surl".to_string(), self.config.redirect.success.clone());
        fields.insert("furl".to_string(), self.config.redirect.failure.clone());
        fields.insert("hash".to_string(), hash);

        info!(
            transaction_id = %request.transaction_id,
            "built signed payu payment form"
        );

        Ok(InitiateOutcome::form(FormPost {
            action: format!("{}/_payment", self.config.base_url),
            fields,
        }))
    }

    fn verify_callback(&self, payload: &JsonValue, signature: &str) -> VerificationResult {
        if !payload.is_object() {
            return VerificationResult::rejected("payload is not a JSON object");
        }

        let txnid = field_or_empty(payload, "txnid");
        if txnid.is_empty() {
            return VerificationResult::rejected("payload missing txnid");
        }

        let expected = self.request_hash(
            &txnid,
            &field_or_empty(payload, "amount"),
            &field_or_empty(payload, "productinfo"),
            &field_or_empty(payload, "firstname"),
            &field_or_empty(payload, "email"),
        );

        if secure_eq(&expected, signature.trim()) {
            VerificationResult::ok()
        } else {
            VerificationResult::rejected("hash mismatch")
        }
    }

    fn parse_callback(&self, payload: &JsonValue) -> GatewayResult<CallbackEvent> {
        let raw_txn = payload
            .get("txnid")
            .and_then(field_as_string)
            .ok_or_else(|| GatewayError::Validation {
                message: "callback payload missing txnid".to_string(),
            })?;
        let transaction_id = raw_txn.trim().to_string();
        if transaction_id != raw_txn {
            warn!(
                transaction_id = %transaction_id,
                "trimmed whitespace from callback transaction id"
            );
        }

        let provider_status = payload
            .get("status")
            .and_then(field_as_string)
            .ok_or_else(|| GatewayError::Validation {
                message: "callback payload missing status".to_string(),
            })?;

        Ok(CallbackEvent {
            gateway: GatewayName::Payu,
            transaction_id,
            provider_reference: payload.get("mihpayid").and_then(field_as_string),
            provider_status,
            amount: payload.get("amount").and_then(field_as_string),
        })
    }

    fn map_status(&self, provider_status: &str) -> PaymentStatus {
        if provider_status.eq_ignore_ascii_case("success")
            || provider_status.eq_ignore_ascii_case("completed")
        {
            PaymentStatus::Success
        } else {
            PaymentStatus::Failed
        }
    }

    async fn check_status(&self, transaction_id: &str) -> GatewayResult<StatusOutcome> {
        if !self.is_configured() {
            return Err(GatewayError::NotConfigured {
                gateway: self.name().to_string(),
            });
        }

        let body = json!({
            "key": self.config.key,
            "command": "verify_payment",
            "var1": transaction_id,
            "hash": self.verify_hash(transaction_id),
        });
        let url = format!("{}/merchant/postservice.php?form=2", self.config.base_url);

        let response: JsonValue = self
            .http
            .request_json(reqwest::Method::POST, &url, None, Some(&body), &[])
            .await
            .map_err(|e| GatewayError::from_http("payu", e))?;

        let provider_status = response
            .pointer(&format!("/transaction_details/{transaction_id}/status"))
            .and_then(JsonValue::as_str)
            .map(String::from);
        let status = provider_status.as_deref().map(|s| self.map_status(s));

        Ok(StatusOutcome {
            provider_status,
            status,
            raw: response,
        })
    }
}
