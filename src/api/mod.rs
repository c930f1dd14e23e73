//! HTTP surface: route table, shared state and handlers.

pub mod admin;
pub mod callbacks;
pub mod intake;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};

use crate::health::HealthChecker;
use crate::middleware::{request_logging, UuidRequestId};
use crate::services::{IntakeService, QueryService, ReconciliationService};
use crate::settings::SettingsCache;

#[derive(Clone)]
pub struct AppState {
    pub intake: Arc<IntakeService>,
    pub reconciliation: Arc<ReconciliationService>,
    pub query: Arc<QueryService>,
    pub settings: Arc<SettingsCache>,
    pub health: Arc<HealthChecker>,
}

async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "service": "vjscholar-backend",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.health.check_health().await)
}

async fn liveness(State(state): State<AppState>) -> impl IntoResponse {
    state.health.liveness()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(health))
        .route("/api/payment/initiate", post(intake::initiate))
        .route("/api/payment/callback", post(callbacks::webhook))
        .route(
            "/api/payment/return",
            post(callbacks::return_post).get(callbacks::return_get),
        )
        .route(
            "/api/payment/status/{transaction_id}",
            get(callbacks::status),
        )
        .route("/api/admin/applications", get(admin::list_applications))
        .route(
            "/api/admin/settings",
            get(admin::get_settings).post(admin::save_settings),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                .layer(axum::middleware::from_fn(request_logging))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
