//! Admin-facing reads over both stores.
//!
//! The stores drift: a callback may have reached one but not the other,
//! or one store may have been down during intake. Reads therefore fetch
//! both sides and merge by transaction id, with the primary store winning
//! any disagreement.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

use crate::error::{AppError, AppResult};
use crate::model::ApplicationRecord;
use crate::stores::DualStoreWriter;

/// Merge two listings by transaction id. Primary wins per id, newest
/// first in the result.
pub fn merge_by_transaction(
    primary: Vec<ApplicationRecord>,
    secondary: Vec<ApplicationRecord>,
) -> Vec<ApplicationRecord> {
    let mut by_id: HashMap<String, ApplicationRecord> = HashMap::new();
    for record in secondary {
        by_id.insert(record.transaction_id.clone(), record);
    }
    for record in primary {
        by_id.insert(record.transaction_id.clone(), record);
    }

    let mut merged: Vec<ApplicationRecord> = by_id.into_values().collect();
    merged.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| a.transaction_id.cmp(&b.transaction_id))
    });
    merged
}

pub struct QueryService {
    writer: Arc<DualStoreWriter>,
}

impl QueryService {
    pub fn new(writer: Arc<DualStoreWriter>) -> Self {
        Self { writer }
    }

    /// All applications, merged across stores. A store being down shrinks
    /// the listing instead of failing it; both down means an empty listing,
    /// not an error.
    pub async fn list_all(&self) -> AppResult<Vec<ApplicationRecord>> {
        let (primary_result, secondary_result) = tokio::join!(
            self.writer.primary().list_all(),
            self.writer.secondary().list_all()
        );

        let primary = primary_result.unwrap_or_else(|e| {
            warn!(store = e.store(), error = %e, "primary listing unavailable");
            Vec::new()
        });
        let secondary = secondary_result.unwrap_or_else(|e| {
            warn!(store = e.store(), error = %e, "secondary listing unavailable");
            Vec::new()
        });

        Ok(merge_by_transaction(primary, secondary))
    }

    /// One application by transaction id. The secondary store receives the
    /// faster post-payment sync in practice, so it answers first; the
    /// primary covers records that have not propagated yet.
    pub async fn get(&self, transaction_id: &str) -> AppResult<ApplicationRecord> {
        let transaction_id = transaction_id.trim();

        match self
            .writer
            .secondary()
            .find_by_transaction_id(transaction_id)
            .await
        {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(e) => {
                warn!(store = e.store(), error = %e, "secondary lookup failed, trying primary");
            }
        }

        match self
            .writer
            .primary()
            .find_by_transaction_id(transaction_id)
            .await
        {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(AppError::not_found(transaction_id)),
            Err(e) => {
                warn!(store = e.store(), error = %e, "primary lookup failed");
                Err(AppError::not_found(transaction_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PaymentStatus;
    use bigdecimal::BigDecimal;
    use chrono::{Duration, Utc};

    fn record(txn: &str, status: PaymentStatus, age_secs: i64) -> ApplicationRecord {
        ApplicationRecord {
            timestamp: Utc::now() - Duration::seconds(age_secs),
            student_id: format!("VJ-{txn}"),
            transaction_id: txn.to_string(),
            payment_status: status,
            amount: BigDecimal::from(250),
            student_name: "Asha".to_string(),
            father_name: String::new(),
            mother_name: String::new(),
            student_mobile: String::new(),
            father_mobile: String::new(),
            mother_mobile: String::new(),
            email: String::new(),
            address: String::new(),
            pincode: String::new(),
            taluk: String::new(),
            district: String::new(),
            present_college: String::new(),
            tenth_percentage: String::new(),
            dd_representative: String::new(),
            country_preference: String::new(),
            college_preference: String::new(),
            budget: String::new(),
            facilities: String::new(),
        }
    }

    #[test]
    fn primary_wins_on_shared_transaction_id() {
        let primary = vec![record("TXN1", PaymentStatus::Success, 10)];
        let secondary = vec![record("TXN1", PaymentStatus::Pending, 10)];
        let merged = merge_by_transaction(primary, secondary);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].payment_status, PaymentStatus::Success);
    }

    #[test]
    fn records_unique_to_either_store_survive() {
        let primary = vec![record("TXN1", PaymentStatus::Success, 30)];
        let secondary = vec![record("TXN2", PaymentStatus::Pending, 20)];
        let merged = merge_by_transaction(primary, secondary);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn merged_listing_is_newest_first() {
        let primary = vec![
            record("TXN-old", PaymentStatus::Success, 300),
            record("TXN-new", PaymentStatus::Pending, 5),
        ];
        let secondary = vec![record("TXN-mid", PaymentStatus::Failed, 60)];
        let merged = merge_by_transaction(primary, secondary);
        let ids: Vec<&str> = merged.iter().map(|r| r.transaction_id.as_str()).collect();
        assert_eq!(ids, vec!["TXN-new", "TXN-mid", "TXN-old"]);
    }

    #[test]
    fn empty_inputs_merge_to_empty() {
        assert!(merge_by_transaction(Vec::new(), Vec::new()).is_empty());
    }
}
