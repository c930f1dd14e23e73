use axum::{extract::State, response::IntoResponse, Json};
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::middleware::success_response;
use crate::settings::Settings;

use super::AppState;

/// Settings keys whose values are secrets and never leave the server.
const SECRET_KEYS: [&str; 3] = ["phonepeSaltKey", "payuSalt", "sheetsApiToken"];

fn masked(settings: &Settings) -> JsonValue {
    let mut value = serde_json::to_value(settings).unwrap_or_else(|_| json!({}));
    if let Some(object) = value.as_object_mut() {
        for key in SECRET_KEYS {
            let is_set = object
                .get(key)
                .and_then(JsonValue::as_str)
                .map(|s| !s.trim().is_empty())
                .unwrap_or(false);
            object.insert(
                key.to_string(),
                JsonValue::String(if is_set { "********".to_string() } else { String::new() }),
            );
        }
    }
    value
}

/// GET /api/admin/applications
pub async fn list_applications(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let records = state.query.list_all().await?;
    Ok(success_response(json!({
        "count": records.len(),
        "applications": records,
    })))
}

/// GET /api/admin/settings
///
/// Secrets come back masked; the frontend only needs to know whether
/// they are set.
pub async fn get_settings(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let settings = state.settings.get();
    Ok(success_response(masked(&settings)))
}

/// POST /api/admin/settings
///
/// Merge-saves the supplied keys over the stored settings and refreshes
/// the cache so the change takes effect immediately.
pub async fn save_settings(
    State(state): State<AppState>,
    Json(patch): Json<JsonValue>,
) -> AppResult<impl IntoResponse> {
    if !patch.is_object() {
        return Err(AppError::malformed("settings payload must be a JSON object"));
    }

    let updated = state
        .settings
        .save(&patch)
        .map_err(|e| AppError::configuration(e.to_string()))?;

    info!("admin settings updated");
    Ok(success_response(masked(&updated)))
}
