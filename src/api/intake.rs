use axum::{extract::State, response::IntoResponse, Json};
use serde_json::Value as JsonValue;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::success_response;
use crate::services::IntakeForm;

use super::AppState;

/// POST /api/payment/initiate
///
/// Validates the application, persists it to both stores, then starts a
/// payment with the configured gateway.
pub async fn initiate(
    State(state): State<AppState>,
    Json(body): Json<JsonValue>,
) -> AppResult<impl IntoResponse> {
    let form: IntakeForm = serde_json::from_value(body)
        .map_err(|e| AppError::malformed(format!("invalid request body: {e}")))?;

    let outcome = state.intake.submit(form).await?;
    info!(
        transaction_id = %outcome.transaction_id,
        gateway = %outcome.gateway,
        test = outcome.test_fallback,
        "application accepted"
    );
    Ok(success_response(outcome.to_response_body()))
}
