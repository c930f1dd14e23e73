use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::model::PaymentStatus;

use super::error::GatewayResult;
use super::types::{
    CallbackEvent, GatewayName, InitiateOutcome, InitiateRequest, StatusOutcome,
    VerificationResult,
};

/// One payment gateway integration. Adapters own their canonicalization
/// and status vocabulary so nothing outside this module branches on the
/// gateway name.
#[async_trait]
pub trait GatewayAdapter: Send + Sync {
    fn name(&self) -> GatewayName;

    /// False when the operator has not supplied credentials. Initiation
    /// treats an unconfigured gateway as a soft failure (test-mode
    /// fallback), never a crash.
    fn is_configured(&self) -> bool;

    async fn initiate(&self, request: &InitiateRequest) -> GatewayResult<InitiateOutcome>;

    /// Recompute the signature over the echoed fields and compare in
    /// constant time. Malformed payloads are rejections, not errors.
    fn verify_callback(&self, payload: &JsonValue, signature: &str) -> VerificationResult;

    /// Extract the fields reconciliation needs from a callback payload.
    fn parse_callback(&self, payload: &JsonValue) -> GatewayResult<CallbackEvent>;

    /// Map a provider status code into the unified vocabulary.
    fn map_status(&self, provider_status: &str) -> PaymentStatus;

    async fn check_status(&self, transaction_id: &str) -> GatewayResult<StatusOutcome>;
}
