//! Scholarship application intake and payment reconciliation backend.

pub mod api;
pub mod config;
pub mod error;
pub mod gateways;
pub mod health;
pub mod http_client;
pub mod logging;
pub mod middleware;
pub mod model;
pub mod services;
pub mod settings;
pub mod stores;
