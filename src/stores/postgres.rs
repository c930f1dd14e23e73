//! Primary store: the `applications` table in Postgres.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::config::DatabaseConfig;
use crate::model::{ApplicationRecord, PaymentStatus};

use super::{RecordStore, StoreError};

const STORE_NAME: &str = "postgres";

const RECORD_COLUMNS: &str = "timestamp, student_id, transaction_id, payment_status, amount, \
     student_name, father_name, mother_name, student_mobile, father_mobile, mother_mobile, \
     email, address, pincode, taluk, district, present_college, tenth_percentage, \
     dd_representative, country_preference, college_preference, budget, facilities";

pub async fn connect_pool(config: &DatabaseConfig, url: &str) -> Result<PgPool, sqlx::Error> {
    let mut options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connection_timeout));
    if let Some(idle) = config.idle_timeout {
        options = options.idle_timeout(Duration::from_secs(idle));
    }
    options.connect(url).await
}

#[derive(Debug, FromRow)]
struct ApplicationRow {
    timestamp: DateTime<Utc>,
    student_id: String,
    transaction_id: String,
    payment_status: String,
    amount: BigDecimal,
    student_name: String,
    father_name: String,
    mother_name: String,
    student_mobile: String,
    father_mobile: String,
    mother_mobile: String,
    email: String,
    address: String,
    pincode: String,
    taluk: String,
    district: String,
    present_college: String,
    tenth_percentage: String,
    dd_representative: String,
    country_preference: String,
    college_preference: String,
    budget: String,
    facilities: String,
}

impl From<ApplicationRow> for ApplicationRecord {
    fn from(row: ApplicationRow) -> Self {
        let payment_status = PaymentStatus::from_str(&row.payment_status).unwrap_or_else(|_| {
            warn!(
                transaction_id = %row.transaction_id,
                stored = %row.payment_status,
                "unknown payment status in database, treating as pending"
            );
            PaymentStatus::Pending
        });
        ApplicationRecord {
            timestamp: row.timestamp,
            student_id: row.student_id,
            transaction_id: row.transaction_id,
            payment_status,
            amount: row.amount,
            student_name: row.student_name,
            father_name: row.father_name,
            mother_name: row.mother_name,
            student_mobile: row.student_mobile,
            father_mobile: row.father_mobile,
            mother_mobile: row.mother_mobile,
            email: row.email,
            address: row.address,
            pincode: row.pincode,
            taluk: row.taluk,
            district: row.district,
            present_college: row.present_college,
            tenth_percentage: row.tenth_percentage,
            dd_representative: row.dd_representative,
            country_preference: row.country_preference,
            college_preference: row.college_preference,
            budget: row.budget,
            facilities: row.facilities,
        }
    }
}

pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn query_error(e: sqlx::Error) -> StoreError {
        match e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => StoreError::Unavailable {
                store: STORE_NAME,
                reason: e.to_string(),
            },
            other => StoreError::Query {
                store: STORE_NAME,
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl RecordStore for ApplicationRepository {
    fn name(&self) -> &'static str {
        STORE_NAME
    }

    async fn insert(&self, record: &ApplicationRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO applications (timestamp, student_id, transaction_id, payment_status, \
             amount, student_name, father_name, mother_name, student_mobile, father_mobile, \
             mother_mobile, email, address, pincode, taluk, district, present_college, \
             tenth_percentage, dd_representative, country_preference, college_preference, \
             budget, facilities) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21, $22, $23)",
        )
        .bind(record.timestamp)
        .bind(&record.student_id)
        .bind(&record.transaction_id)
        .bind(record.payment_status.as_str())
        .bind(&record.amount)
        .bind(&record.student_name)
        .bind(&record.father_name)
        .bind(&record.mother_name)
        .bind(&record.student_mobile)
        .bind(&record.father_mobile)
        .bind(&record.mother_mobile)
        .bind(&record.email)
        .bind(&record.address)
        .bind(&record.pincode)
        .bind(&record.taluk)
        .bind(&record.district)
        .bind(&record.present_college)
        .bind(&record.tenth_percentage)
        .bind(&record.dd_representative)
        .bind(&record.country_preference)
        .bind(&record.college_preference)
        .bind(&record.budget)
        .bind(&record.facilities)
        .execute(&self.pool)
        .await
        .map_err(Self::query_error)?;
        Ok(())
    }

    async fn update_status(
        &self,
        transaction_id: &str,
        status: PaymentStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE applications SET payment_status = $2 WHERE transaction_id = $1",
        )
        .bind(transaction_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(Self::query_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_by_transaction_id(
        &self,
        transaction_id: &str,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let row = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM applications WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Self::query_error)?;
        Ok(row.map(ApplicationRecord::from))
    }

    async fn list_all(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        let rows = sqlx::query_as::<_, ApplicationRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM applications ORDER BY timestamp DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(Self::query_error)?;
        Ok(rows.into_iter().map(ApplicationRecord::from).collect())
    }
}
