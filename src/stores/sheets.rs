//! Secondary store: one spreadsheet row per application.
//!
//! Rows are appended through the Sheets values API and located again by
//! scanning the transaction id column. Cells may carry whitespace added
//! by hand edits, so comparisons trim both sides and log when trimming
//! changed anything.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde_json::{json, Value as JsonValue};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::http_client::JsonClient;
use crate::model::{ApplicationRecord, PaymentStatus};
use crate::settings::SettingsCache;

use super::{RecordStore, StoreError};

const STORE_NAME: &str = "sheets";
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Zero-based column positions in the sheet. The status column letter
/// must stay in sync with `STATUS_COL`.
const TRANSACTION_ID_COL: usize = 2;
const STATUS_COL: usize = 3;
const STATUS_COL_LETTER: &str = "D";
const COLUMN_COUNT: usize = 23;

pub struct SheetStore {
    settings: Arc<SettingsCache>,
    http: JsonClient,
}

impl SheetStore {
    pub fn new(settings: Arc<SettingsCache>) -> Result<Self, StoreError> {
        let http = JsonClient::new(Duration::from_secs(10), 2).map_err(|e| {
            StoreError::Unavailable {
                store: STORE_NAME,
                reason: e.to_string(),
            }
        })?;
        Ok(Self { settings, http })
    }

    fn credentials(&self) -> Result<(String, String, String), StoreError> {
        let settings = self.settings.get();
        if settings.sheet_id.trim().is_empty() || settings.sheets_api_token.trim().is_empty() {
            return Err(StoreError::Unavailable {
                store: STORE_NAME,
                reason: "sheet id or API token not configured".to_string(),
            });
        }
        let sheet_name = if settings.sheet_name.trim().is_empty() {
            "Sheet1".to_string()
        } else {
            settings.sheet_name.trim().to_string()
        };
        Ok((
            settings.sheet_id.trim().to_string(),
            sheet_name,
            settings.sheets_api_token.trim().to_string(),
        ))
    }

    async fn fetch_rows(
        &self,
        sheet_id: &str,
        sheet_name: &str,
        token: &str,
    ) -> Result<Vec<Vec<String>>, StoreError> {
        let url = format!("{SHEETS_API_BASE}/{sheet_id}/values/{sheet_name}!A:W");
        let response: JsonValue = self
            .http
            .request_json(reqwest::Method::GET, &url, Some(token), None, &[])
            .await
            .map_err(|e| StoreError::Query {
                store: STORE_NAME,
                message: e.to_string(),
            })?;

        let values = response
            .get("values")
            .and_then(JsonValue::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(values
            .into_iter()
            .map(|row| {
                row.as_array()
                    .map(|cells| {
                        cells
                            .iter()
                            .map(|c| c.as_str().unwrap_or_default().to_string())
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }

    /// Scan for the row carrying this transaction id. Returns the
    /// one-based sheet row number.
    fn locate(rows: &[Vec<String>], transaction_id: &str) -> Option<usize> {
        let wanted = transaction_id.trim();
        for (index, row) in rows.iter().enumerate() {
            let Some(cell) = row.get(TRANSACTION_ID_COL) else {
                continue;
            };
            let trimmed = cell.trim();
            if trimmed != cell && trimmed == wanted {
                warn!(
                    transaction_id = wanted,
                    row = index + 1,
                    "matched transaction id only after trimming sheet cell"
                );
            }
            if trimmed == wanted {
                return Some(index + 1);
            }
        }
        None
    }
}

pub fn record_to_row(record: &ApplicationRecord) -> Vec<String> {
    vec![
        record.timestamp.to_rfc3339(),
        record.student_id.clone(),
        record.transaction_id.clone(),
        record.payment_status.to_string(),
        record.amount.to_string(),
        record.student_name.clone(),
        record.father_name.clone(),
        record.mother_name.clone(),
        record.student_mobile.clone(),
        record.father_mobile.clone(),
        record.mother_mobile.clone(),
        record.email.clone(),
        record.address.clone(),
        record.pincode.clone(),
        record.taluk.clone(),
        record.district.clone(),
        record.present_college.clone(),
        record.tenth_percentage.clone(),
        record.dd_representative.clone(),
        record.country_preference.clone(),
        record.college_preference.clone(),
        record.budget.clone(),
        record.facilities.clone(),
    ]
}

/// Turn a sheet row back into a record. Header rows and rows without a
/// transaction id come back as `None`.
pub fn row_to_record(row: &[String]) -> Option<ApplicationRecord> {
    let cell = |i: usize| row.get(i).map(|s| s.trim().to_string()).unwrap_or_default();

    let transaction_id = cell(TRANSACTION_ID_COL);
    if transaction_id.is_empty() || transaction_id.eq_ignore_ascii_case("transaction id") {
        return None;
    }

    let timestamp = DateTime::parse_from_rfc3339(&cell(0))
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH);
    let payment_status = PaymentStatus::from_str(&cell(STATUS_COL)).unwrap_or(PaymentStatus::Pending);
    let amount = BigDecimal::from_str(&cell(4)).unwrap_or_else(|_| BigDecimal::from(0));

    Some(ApplicationRecord {
        timestamp,
        student_id: cell(1),
        transaction_id,
        payment_status,
        amount,
        student_name: cell(5),
        father_name: cell(6),
        mother_name: cell(7),
        student_mobile: cell(8),
        father_mobile: cell(9),
        mother_mobile: cell(10),
        email: cell(11),
        address: cell(12),
        pincode: cell(13),
        taluk: cell(14),
        district: cell(15),
        present_college: cell(16),
        tenth_percentage: cell(17),
        dd_representative: cell(18),
        country_preference: cell(19),
        college_preference: cell(20),
        budget: cell(21),
        facilities: cell(22),
    })
}

#[async_trait]
impl RecordStore for SheetStore {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        let (sheet_id, sheet_name, token) = self.credentials()?;
        let row = record_to_row(record);
        debug_assert_eq!(row.len(), COLUMN_COUNT);

        let url = format!(
            "{SHEETS_API_BASE}/{sheet_id}/values/{sheet_name}!A:W:append?valueInputOption=USER_ENTERED"
        );
        let body = json!({ "values": [row] });
        let _: JsonValue = self
            .http
            .request_json(reqwest::Method::POST, &url, Some(&token), Some(&body), &[])
            .await
            .map_err(|e| StoreError::Query {
                store: STORE_NAME,
                message: e.to_string(),
            })?;

        debug!(transaction_id = %record.transaction_id, "appended application row");
        Ok(())
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let (sheet_id, sheet_name, token) = self.credentials()?;
        let rows = self.fetch_rows(&sheet_id, &sheet_name, &token).await?;

        let Some(row_number) = Self::locate(&rows, transaction_id) else {
            return Ok(false);
        };

        let url = format!(
            "{SHEETS_API_BASE}/{sheet_id}/values/{sheet_name}!{STATUS_COL_LETTER}{row_number}?valueInputOption=USER_ENTERED"
        );
        let body = json!({ "values": [[status.as_str()]] });
        let _: JsonValue = self
            .http
            .request_json(reqwest::Method::PUT, &url, Some(&token), Some(&body), &[])
            .await
            .map_err(|e| StoreError::Query {
                store: STORE_NAME,
                message: e.to_string(),
            })?;

        debug!(transaction_id, row = row_number, status = %status, "updated payment status cell");
        Ok(true)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let (sheet_id, sheet_name, token) = self.credentials()?;
        let rows = self.fetch_rows(&sheet_id, &sheet_name, &token).await?;
        let wanted = transaction_id.trim();
        Ok(rows
            .iter()
            .filter_map(|row| row_to_record(row))
            .find(|record| record.transaction_id == wanted))
    }

    async fn list_all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        let (sheet_id, sheet_name, token) = self.credentials()?;
        let rows = self.fetch_rows(&sheet_id, &sheet_name, &token).await?;
        Ok(rows.iter().filter_map(|row| row_to_record(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> ApplicationRecord {
        ApplicationRecord {
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 10, 30, 0).unwrap(),
            student_id: "VJ1717237800000ABCD".to_string(),
            transaction_id: "TXN1717237800000ABC123".to_string(),
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

    #[test]
    fn row_mapping_round_trips() {
        let record = sample_record();
        let row = record_to_row(&record);
        assert_eq!(row.len(), COLUMN_COUNT);
        assert_eq!(row[TRANSACTION_ID_COL], record.transaction_id);
        assert_eq!(row[STATUS_COL], "PENDING");

        let parsed = row_to_record(&row).expect("row should parse");
        assert_eq!(parsed.transaction_id, record.transaction_id);
        assert_eq!(parsed.timestamp, record.timestamp);
        assert_eq!(parsed.payment_status, PaymentStatus::Pending);
        assert_eq!(parsed.amount, record.amount);
    }

    #[test]
    fn header_row_is_skipped() {
        let header: Vec<String> = vec![
            "Timestamp",
            "Student ID",
            "Transaction ID",
            "Payment Status",
            "Amount",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert!(row_to_record(&header).is_none());

        let empty: Vec<String> = vec![String::new(); 3];
        assert!(row_to_record(&empty).is_none());
    }

    #[test]
    fn locate_trims_cell_whitespace() {
        let mut row = record_to_row(&sample_record());
        row[TRANSACTION_ID_COL] = format!(" {} ", row[TRANSACTION_ID_COL]);
        let rows = vec![vec!["Timestamp".to_string()], row];
        assert_eq!(SheetStore::locate(&rows, "TXN1717237800000ABC123"), Some(2));
        assert_eq!(SheetStore::locate(&rows, "TXN-missing"), None);
    }

    #[test]
    fn short_rows_parse_with_defaults() {
        let row: Vec<String> = vec![
            "not-a-date".to_string(),
            "VJ1".to_string(),
            "TXN1".to_string(),
        ];
        let record = row_to_record(&row).expect("short row should still parse");
        assert_eq!(record.payment_status, PaymentStatus::Pending);
        assert_eq!(record.amount, BigDecimal::from(0));
        assert_eq!(record.timestamp, DateTime::<Utc>::UNIX_EPOCH);
    }
}
