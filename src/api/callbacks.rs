use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;

use crate::error::AppResult;
use crate::middleware::success_response;
use crate::services::StatusReport;

use super::AppState;

/// Signature headers accepted on the webhook path. PhonePe sends
/// `X-VERIFY`; PayU puts the hash in the body.
fn extract_signature(headers: &HeaderMap, payload: &JsonValue) -> Option<String> {
    headers
        .get("x-verify")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            payload
                .get("hash")
                .and_then(JsonValue::as_str)
                .map(str::to_string)
        })
}

/// POST /api/payment/callback
///
/// Server-to-server notification. Signature is mandatory; the payload
/// shape decides which gateway's verification runs.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<JsonValue>,
) -> AppResult<impl IntoResponse> {
    let signature = extract_signature(&headers, &payload);
    let outcome = state
        .reconciliation
        .handle_webhook(&payload, signature.as_deref())
        .await?;

    Ok(success_response(json!({
        "transactionId": outcome.transaction_id,
        "status": outcome.status,
        "updated": outcome.updated,
    })))
}

fn map_to_json(fields: HashMap<String, String>) -> JsonValue {
    JsonValue::Object(
        fields
            .into_iter()
            .map(|(k, v)| (k, JsonValue::String(v)))
            .collect(),
    )
}

/// POST /api/payment/return
///
/// Browser lands here from the gateway with a form-encoded body. Always
/// answers with a redirect, never an error body.
pub async fn return_post(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> impl IntoResponse {
    let target = state.reconciliation.handle_return(&map_to_json(fields)).await;
    Redirect::to(&target.0)
}

/// GET /api/payment/return
///
/// Two callers share this path: gateways that redirect the browser back
/// with query parameters, and the frontend polling with a bare
/// `transactionId`. A poll gets status JSON; anything else gets the
/// redirect treatment.
pub async fn return_get(
    State(state): State<AppState>,
    Query(fields): Query<HashMap<String, String>>,
) -> Response {
    if let Some(transaction_id) = fields.get("transactionId") {
        if !fields.contains_key("txnid") && !fields.contains_key("code") {
            return match state.reconciliation.check_status(transaction_id).await {
                Ok(report) => status_body(&report).into_response(),
                Err(e) => e.into_response(),
            };
        }
    }
    let target = state.reconciliation.handle_return(&map_to_json(fields)).await;
    Redirect::to(&target.0).into_response()
}

fn status_body(report: &StatusReport) -> impl IntoResponse {
    success_response(json!({
        "transactionId": report.transaction_id,
        "paymentStatus": report.status,
        "source": report.source,
        "providerStatus": report.provider_status,
        "transaction": report.record,
    }))
}

/// GET /api/payment/status/{transaction_id}
pub async fn status(
    State(state): State<AppState>,
    Path(transaction_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let report = state.reconciliation.check_status(&transaction_id).await?;
    Ok(status_body(&report))
}
