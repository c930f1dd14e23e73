//! Callback reconciliation: verify gateway callbacks, overwrite payment
//! status in both stores, and decide where to send the browser.

use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::gateways::{AdapterFactory, GatewayAdapter, GatewayName, RedirectUrls};
use crate::model::{ApplicationRecord, PaymentStatus};
use crate::settings::SettingsCache;
use crate::stores::DualStoreWriter;

#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    pub transaction_id: String,
    pub status: PaymentStatus,
    /// False when neither store held the transaction.
    pub updated: bool,
}

/// Where the browser goes after a payment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectTarget(pub String);

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub transaction_id: String,
    pub status: PaymentStatus,
    /// "store" when answered from persistence, "gateway" after a poll.
    pub source: &'static str,
    pub provider_status: Option<String>,
    /// The stored record, with `payment_status` reflecting any fresher
    /// answer from the gateway poll.
    pub record: ApplicationRecord,
}

/// Callbacks do not always say which gateway sent them, so the payload
/// shape decides: PhonePe events carry `transactionId` and `code`, PayU
/// events carry `txnid`.
pub fn detect_gateway(payload: &JsonValue) -> Option<GatewayName> {
    let object = payload.as_object()?;
    if object.contains_key("transactionId") && object.contains_key("code") {
        Some(GatewayName::Phonepe)
    } else if object.contains_key("txnid") {
        Some(GatewayName::Payu)
    } else {
        None
    }
}

pub struct ReconciliationService {
    writer: Arc<DualStoreWriter>,
    settings: Arc<SettingsCache>,
    factory: Arc<dyn AdapterFactory>,
}

impl ReconciliationService {
    pub fn new(
        writer: Arc<DualStoreWriter>,
        settings: Arc<SettingsCache>,
        factory: Arc<dyn AdapterFactory>,
    ) -> Self {
        Self {
            writer,
            settings,
            factory,
        }
    }

    fn adapter_for(&self, payload: &JsonValue) -> AppResult<Box<dyn GatewayAdapter>> {
        let gateway = detect_gateway(payload)
            .ok_or_else(|| AppError::malformed("unrecognized callback payload shape"))?;
        let settings = self.settings.get();
        self.factory
            .adapter(&settings, gateway)
            .map_err(|e| AppError::gateway(gateway.as_str(), e.to_string(), e.is_retryable()))
    }

    /// Server-to-server callback. The signature is mandatory here; a
    /// mismatch is answered before any store is touched.
    pub async fn handle_webhook(
        &self,
        payload: &JsonValue,
        signature: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let adapter = self.adapter_for(payload)?;

        let signature = signature
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(AppError::missing_signature)?;

        let verification = adapter.verify_callback(payload, signature);
        if !verification.valid {
            warn!(
                gateway = %adapter.name(),
                reason = verification.reason.as_deref().unwrap_or("unspecified"),
                "callback signature rejected"
            );
            return Err(AppError::invalid_signature());
        }

        let event = adapter
            .parse_callback(payload)
            .map_err(|e| AppError::malformed(e.to_string()))?;
        let status = adapter.map_status(&event.provider_status);

        info!(
            gateway = %event.gateway,
            transaction_id = %event.transaction_id,
            provider_status = %event.provider_status,
            status = %status,
            provider_reference = event.provider_reference.as_deref().unwrap_or(""),
            "processing verified callback"
        );

        let report = self
            .writer
            .update_status(&event.transaction_id, status)
            .await;
        if !report.any_succeeded() && !report.failures.is_empty() {
            return Err(AppError::storage_unavailable(
                "payment status could not be recorded",
            ));
        }

        Ok(WebhookOutcome {
            transaction_id: event.transaction_id,
            status,
            updated: report.any_succeeded(),
        })
    }

    /// Browser return path. Best effort: the user is mid-redirect, so any
    /// failure lands them on the failure page instead of an error body.
    /// Signatures are verified when the gateway echoed one.
    pub async fn handle_return(&self, payload: &JsonValue) -> RedirectTarget {
        let settings = self.settings.get();
        let urls = RedirectUrls::from_origin(&settings.site_url);

        let adapter = match self.adapter_for(payload) {
            Ok(adapter) => adapter,
            Err(e) => {
                error!(error = %e, "unusable return payload");
                return RedirectTarget(format!("{}?error=system_error", urls.failure));
            }
        };

        if let Some(signature) = payload.get("hash").and_then(JsonValue::as_str) {
            let verification = adapter.verify_callback(payload, signature);
            if !verification.valid {
                warn!(
                    gateway = %adapter.name(),
                    reason = verification.reason.as_deref().unwrap_or("unspecified"),
                    "return payload signature rejected"
                );
                return RedirectTarget(format!("{}?error=invalid_hash", urls.failure));
            }
        } else {
            warn!(gateway = %adapter.name(), "return payload carried no signature");
        }

        let event = match adapter.parse_callback(payload) {
            Ok(event) => event,
            Err(e) => {
                error!(error = %e, "malformed return payload");
                return RedirectTarget(format!("{}?error=system_error", urls.failure));
            }
        };

        let status = adapter.map_status(&event.provider_status);
        let report = self
            .writer
            .update_status(&event.transaction_id, status)
            .await;
        if !report.any_succeeded() {
            // The record may only exist in a store that is down right now;
            // the browser still gets a status page.
            warn!(
                transaction_id = %event.transaction_id,
                "return-path status update reached no store"
            );
        }

        let amount = event.amount.unwrap_or_default();
        let base = match status {
            PaymentStatus::Success => &urls.success,
            _ => &urls.failure,
        };
        RedirectTarget(format!(
            "{}?transactionId={}&status={}&amount={}",
            base, event.transaction_id, event.provider_status, amount
        ))
    }

    /// Current status of one transaction. Answers from the stores; when
    /// the record is still pending, polls the gateway and writes back any
    /// definitive answer.
    pub async fn check_status(&self, transaction_id: &str) -> AppResult<StatusReport> {
        let transaction_id = transaction_id.trim();

        let record = match self
            .writer
            .primary()
            .find_by_transaction_id(transaction_id)
            .await
        {
            Ok(Some(record)) => Some(record),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "primary store lookup failed, trying secondary");
                None
            }
        };
        let record = match record {
            Some(record) => Some(record),
            None => self
                .writer
                .secondary()
                .find_by_transaction_id(transaction_id)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "secondary store lookup failed");
                    None
                }),
        };

        let Some(mut record) = record else {
            return Err(AppError::not_found(transaction_id));
        };

        if record.payment_status != PaymentStatus::Pending {
            return Ok(StatusReport {
                transaction_id: record.transaction_id.clone(),
                status: record.payment_status,
                source: "store",
                provider_status: None,
                record,
            });
        }

        let settings = self.settings.get();
        let gateway = self.factory.selected(&settings);
        let adapter = match self.factory.adapter(&settings, gateway) {
            Ok(adapter) => adapter,
            Err(e) => {
                warn!(gateway = %gateway, error = %e, "cannot build adapter for status poll");
                return Ok(StatusReport {
                    transaction_id: record.transaction_id.clone(),
                    status: PaymentStatus::Pending,
                    source: "store",
                    provider_status: None,
                    record,
                });
            }
        };

        match adapter.check_status(transaction_id).await {
            Ok(outcome) => {
                if let Some(status) = outcome.status {
                    if status != PaymentStatus::Pending {
                        self.writer.update_status(transaction_id, status).await;
                    }
                    record.payment_status = status;
                    Ok(StatusReport {
                        transaction_id: record.transaction_id.clone(),
                        status,
                        source: "gateway",
                        provider_status: outcome.provider_status,
                        record,
                    })
                } else {
                    Ok(StatusReport {
                        transaction_id: record.transaction_id.clone(),
                        status: PaymentStatus::Pending,
                        source: "gateway",
                        provider_status: outcome.provider_status,
                        record,
                    })
                }
            }
            Err(e) => {
                warn!(gateway = %gateway, error = %e, "status poll failed, answering from store");
                Ok(StatusReport {
                    transaction_id: record.transaction_id.clone(),
                    status: PaymentStatus::Pending,
                    source: "store",
                    provider_status: None,
                    record,
                })
            }
        }
    }
}
