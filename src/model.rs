//! Core domain types shared across stores, services and the API surface.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Payment lifecycle state of an application.
///
/// Created as `Pending` at submission time; overwritten (idempotently) to
/// `Success` or `Failed` by callback reconciliation. The overwrite must
/// tolerate a callback arriving zero, one, or several times.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "PENDING" => Ok(PaymentStatus::Pending),
            "SUCCESS" => Ok(PaymentStatus::Success),
            "FAILED" => Ok(PaymentStatus::Failed),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// One scholarship application. The `transaction_id` is the only safe
/// correlation key across the primary and secondary stores.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    pub timestamp: DateTime<Utc>,
    pub student_id: String,
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub amount: BigDecimal,
    pub student_name: String,
    pub father_name: String,
    pub mother_name: String,
    pub student_mobile: String,
    pub father_mobile: String,
    pub mother_mobile: String,
    pub email: String,
    pub address: String,
    pub pincode: String,
    pub taluk: String,
    pub district: String,
    pub present_college: String,
    pub tenth_percentage: String,
    pub dd_representative: String,
    pub country_preference: String,
    pub college_preference: String,
    pub budget: String,
    pub facilities: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_status_round_trips_through_strings() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Success,
            PaymentStatus::Failed,
        ] {
            let parsed: PaymentStatus = status.as_str().parse().expect("parse should succeed");
            assert_eq!(parsed, status);
        }
        assert!(PaymentStatus::from_str("SETTLED").is_err());
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let record = ApplicationRecord {
            timestamp: Utc::now(),
            student_id: "VJ1700000000000ABCD".to_string(),
            transaction_id: "TXN1700000000000ABC123".to_string(),
            payment_status: PaymentStatus::Pending,
            amount: BigDecimal::from(250),
            student_name: "A Student".to_string(),
            father_name: "A Father".to_string(),
            mother_name: "A Mother".to_string(),
            student_mobile: "9876543210".to_string(),
            father_mobile: String::new(),
            mother_mobile: String::new(),
            email: "student@example.com".to_string(),
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
        };
        let json = serde_json::to_value(&record).expect("serialization should succeed");
        assert_eq!(json["transactionId"], "TXN1700000000000ABC123");
        assert_eq!(json["paymentStatus"], "PENDING");
    }
}
