//! Payment gateway adapters and the factory that selects between them.

pub mod adapter;
pub mod error;
pub mod factory;
pub mod providers;
pub mod sign;
pub mod types;

pub use adapter::GatewayAdapter;
pub use error::{GatewayError, GatewayResult};
pub use factory::{AdapterFactory, GatewayFactory};
pub use types::{
    CallbackEvent, FormPost, GatewayName, InitiateOutcome, InitiateRequest, RedirectUrls,
    StatusOutcome, VerificationResult,
};
