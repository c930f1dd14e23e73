//! Application record persistence.
//!
//! Two independent stores hold every record: the Postgres repository
//! (primary) and the spreadsheet store (secondary). Writes fan out to
//! both through [`DualStoreWriter`]; a submission survives as long as at
//! least one store accepted it.

pub mod postgres;
pub mod sheets;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::model::{ApplicationRecord, PaymentStatus};

pub use postgres::ApplicationRepository;
pub use sheets::SheetStore;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store '{store}' is unavailable: {reason}")]
    Unavailable { store: &'static str, reason: String },

    #[error("store '{store}' query failed: {message}")]
    Query { store: &'static str, message: String },
}

impl StoreError {
    pub fn store(&self) -> &'static str {
        match self {
            StoreError::Unavailable { store, .. } => store,
            StoreError::Query { store, .. } => store,
        }
    }
}

/// One place application records live. Both stores are eventually
/// consistent with each other; the transaction id is the correlation key.
#[async_trait]
pub trait RecordStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError>;

    /// Overwrite the status of the record with this transaction id.
    /// Returns false when no such record exists in this store.
    async fn update_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> Result<bool, StoreError>;

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError>;

    async fn list_all(&self) -> Result<Vec<ApplicationRecord>, StoreError>;
}

/// Stand-in for a store whose backing service is not configured. Every
/// operation reports unavailability; the dual writer degrades to the
/// other store.
pub struct DisabledStore {
    name: &'static str,
    reason: String,
}

impl DisabledStore {
    pub fn new(name: &'static str, reason: impl Into<String>) -> Self {
        Self {
            name,
            reason: reason.into(),
        }
    }

    fn error(&self) -> StoreError {
        StoreError::Unavailable {
            store: self.name,
            reason: self.reason.clone(),
        }
    }
}

#[async_trait]
impl RecordStore for DisabledStore {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn insert(&self, _record: &ApplicationRecord) -> Result<(), StoreError> {
        Err(self.error())
    }

    async fn update_status(
        &self,
        _transaction_id: &str,
        _status: PaymentStatus,
    ) -> Result<bool, StoreError> {
        Err(self.error())
    }

    async fn find_by_transaction_id(
        &self,
        _transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        Err(self.error())
    }

    async fn list_all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        Err(self.error())
    }
}

/// Outcome of a fan-out write.
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub primary_ok: bool,
    pub secondary_ok: bool,
    pub failures: Vec<String>,
}

impl WriteReport {
    pub fn any_succeeded(&self) -> bool {
        self.primary_ok || self.secondary_ok
    }
}

/// Fans writes out to both stores and reports per-store results instead
/// of failing fast. Reads go through the stores directly.
pub struct DualStoreWriter {
    primary: Arc<dyn RecordStore>,
    secondary: Arc<dyn RecordStore>,
}

impl DualStoreWriter {
    pub fn new(primary: Arc<dyn RecordStore>, secondary: Arc<dyn RecordStore>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &Arc<dyn RecordStore> {
        &self.primary
    }

    pub fn secondary(&self) -> &Arc<dyn RecordStore> {
        &self.secondary
    }

    pub async fn insert(&self, record: &ApplicationRecord) -> WriteReport {
        let (primary_result, secondary_result) =
            tokio::join!(self.primary.insert(record), self.secondary.insert(record));

        let mut failures = Vec::new();
        let primary_ok = match primary_result {
            Ok(()) => true,
            Err(e) => {
                warn!(store = e.store(), error = %e, "primary insert failed");
                failures.push(e.to_string());
                false
            }
        };
        let secondary_ok = match secondary_result {
            Ok(()) => true,
            Err(e) => {
                warn!(store = e.store(), error = %e, "secondary insert failed");
                failures.push(e.to_string());
                false
            }
        };

        info!(
            transaction_id = %record.transaction_id,
            primary_ok,
            secondary_ok,
            "application record persisted"
        );
        WriteReport {
            primary_ok,
            secondary_ok,
            failures,
        }
    }

    pub async fn update_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> WriteReport {
        let (primary_result, secondary_result) = tokio::join!(
            self.primary.update_status(transaction_id, status),
            self.secondary.update_status(transaction_id, status)
        );

        let mut failures = Vec::new();
        let primary_ok = match primary_result {
            Ok(found) => {
                if !found {
                    warn!(
                        store = self.primary.name(),
                        transaction_id, "no record to update in primary store"
                    );
                }
                found
            }
            Err(e) => {
                warn!(store = e.store(), error = %e, "primary status update failed");
                failures.push(e.to_string());
                false
            }
        };
        let secondary_ok = match secondary_result {
            Ok(found) => {
                if !found {
                    warn!(
                        store = self.secondary.name(),
                        transaction_id, "no record to update in secondary store"
                    );
                }
                found
            }
            Err(e) => {
                warn!(store = e.store(), error = %e, "secondary status update failed");
                failures.push(e.to_string());
                false
            }
        };

        info!(
            transaction_id,
            status = %status,
            primary_ok,
            secondary_ok,
            "payment status reconciled"
        );
        WriteReport {
            primary_ok,
            secondary_ok,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;
    use std::sync::Mutex;

    fn sample_record(txn: &str) -> ApplicationRecord {
        ApplicationRecord {
            timestamp: Utc::now(),
            student_id: "VJ1".to_string(),
            transaction_id: txn.to_string(),
            payment_status: PaymentStatus::Pending,
            amount: BigDecimal::from(250),
            student_name: "Asha".to_string(),
            father_name: "Ravi".to_string(),
            mother_name: "Lakshmi".to_string(),
            student_mobile: "9876543210".to_string(),
            father_mobile: String::new(),
            mother_mobile: String::new(),
            email: "asha@example.com".to_string(),
            address: "12 Main Road".to_string(),
            pincode: "560001".to_string(),
            taluk: "North".to_string(),
            district: "Bengaluru".to_string(),
            present_college: "City PU College".to_string(),
            tenth_percentage: "88.4".to_string(),
            dd_representative: String::new(),
            country_preference: "India".to_string(),
            college_preference: String::new(),
            budget: String::new(),
            facilities: String::new(),
        }
    }

    struct MemoryStore {
        name: &'static str,
        records: Mutex<Vec<ApplicationRecord>>,
        fail: bool,
    }

    impl MemoryStore {
        fn new(name: &'static str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                name,
                records: Mutex::new(Vec::new()),
                fail,
            })
        }
    }

    #[async_trait]
    impl RecordStore for MemoryStore {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable {
                    store: self.name,
                    reason: "down".to_string(),
                });
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }

        async fn update_status(
            &self,
            transaction_id: &str,
            status: PaymentStatus,
        ) -> Result<bool, StoreError> {
            if self.fail {
                return Err(StoreError::Unavailable {
                    store: self.name,
                    reason: "down".to_string(),
                });
            }
            let mut records = self.records.lock().unwrap();
            let mut found = false;
            for record in records.iter_mut() {
                if record.transaction_id == transaction_id {
                    record.payment_status = status;
                    found = true;
                }
            }
            Ok(found)
        }

        async fn find_by_transaction_id(
            &self,
            transaction_id: &str,
        ) -> Result<Option<ApplicationRecord>, StoreError> {
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.transaction_id == transaction_id)
                .cloned())
        }

        async fn list_all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
            Ok(self.records.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn insert_succeeds_when_one_store_is_down() {
        let primary = MemoryStore::new("db", true);
        let secondary = MemoryStore::new("sheet", false);
        let writer = DualStoreWriter::new(primary, secondary.clone());

        let report = writer.insert(&sample_record("TXN1")).await;
        assert!(report.any_succeeded());
        assert!(!report.primary_ok);
        assert!(report.secondary_ok);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(secondary.records.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insert_reports_total_failure() {
        let writer = DualStoreWriter::new(
            MemoryStore::new("db", true),
            MemoryStore::new("sheet", true),
        );
        let report = writer.insert(&sample_record("TXN1")).await;
        assert!(!report.any_succeeded());
        assert_eq!(report.failures.len(), 2);
    }

    #[tokio::test]
    async fn status_update_is_idempotent() {
        let primary = MemoryStore::new("db", false);
        let secondary = MemoryStore::new("sheet", false);
        let writer = DualStoreWriter::new(primary.clone(), secondary);

        writer.insert(&sample_record("TXN1")).await;
        writer.update_status("TXN1", PaymentStatus::Success).await;
        let repeat = writer.update_status("TXN1", PaymentStatus::Success).await;

        assert!(repeat.any_succeeded());
        let record = primary
            .find_by_transaction_id("TXN1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.payment_status, PaymentStatus::Success);
    }

    #[tokio::test]
    async fn disabled_store_reports_unavailable() {
        let store = DisabledStore::new("sheet", "no API token configured");
        let err = store.insert(&sample_record("TXN1")).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { store: "sheet", .. }));
    }
}
