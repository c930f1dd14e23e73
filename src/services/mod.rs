//! Business logic: intake, callback reconciliation and admin reads.

pub mod intake;
pub mod query;
pub mod reconciliation;

pub use intake::{IntakeForm, IntakeOutcome, IntakeService};
pub use query::{merge_by_transaction, QueryService};
pub use reconciliation::{ReconciliationService, StatusReport, WebhookOutcome};
