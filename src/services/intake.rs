//! Application intake: validate the form, persist to both stores, then
//! hand off to the selected payment gateway.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{AppError, AppResult};
use crate::gateways::{AdapterFactory, GatewayError, InitiateOutcome, InitiateRequest};
use crate::model::{ApplicationRecord, PaymentStatus};
use crate::settings::SettingsCache;
use crate::stores::DualStoreWriter;

/// Raw submission payload. Field names mirror the public form.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntakeForm {
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
    /// Skips the real gateway and returns a canned redirect.
    pub test_mode: bool,
}

/// Checked in submission order; the first violation is the one reported.
const REQUIRED_FIELDS: [(&str, fn(&IntakeForm) -> &str); 12] = [
    ("studentName", |f| &f.student_name),
    ("fatherName", |f| &f.father_name),
    ("motherName", |f| &f.mother_name),
    ("studentMobile", |f| &f.student_mobile),
    ("email", |f| &f.email),
    ("address", |f| &f.address),
    ("pincode", |f| &f.pincode),
    ("taluk", |f| &f.taluk),
    ("district", |f| &f.district),
    ("presentCollege", |f| &f.present_college),
    ("tenthPercentage", |f| &f.tenth_percentage),
    ("countryPreference", |f| &f.country_preference),
];

fn email_is_valid(email: &str) -> bool {
    use regex::Regex;
    use std::sync::OnceLock;
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL_RE
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("static regex is valid"));
    re.is_match(email)
}

fn mobile_is_valid(mobile: &str) -> bool {
    let digits: String = mobile.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.len() == 10 && mobile.chars().all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
}

fn pincode_is_valid(pincode: &str) -> bool {
    pincode.len() == 6 && pincode.chars().all(|c| c.is_ascii_digit())
}

pub fn validate(form: &IntakeForm) -> AppResult<()> {
    for (name, get) in REQUIRED_FIELDS {
        if get(form).trim().is_empty() {
            return Err(AppError::missing_field(name));
        }
    }

    if !email_is_valid(form.email.trim()) {
        return Err(AppError::invalid_email());
    }
    if !mobile_is_valid(form.student_mobile.trim()) {
        return Err(AppError::invalid_mobile("studentMobile"));
    }
    for (name, value) in [
        ("fatherMobile", &form.father_mobile),
        ("motherMobile", &form.mother_mobile),
    ] {
        let value = value.trim();
        if !value.is_empty() && !mobile_is_valid(value) {
            return Err(AppError::invalid_mobile(name));
        }
    }
    if !pincode_is_valid(form.pincode.trim()) {
        return Err(AppError::invalid_pincode());
    }

    let percentage = f64::from_str(form.tenth_percentage.trim())
        .map_err(|_| AppError::out_of_range("tenthPercentage", 0.0, 100.0))?;
    if !(0.0..=100.0).contains(&percentage) {
        return Err(AppError::out_of_range("tenthPercentage", 0.0, 100.0));
    }

    Ok(())
}

/// Millisecond timestamp plus uppercase random suffix. Collisions across
/// concurrent submissions within the same millisecond are what the random
/// tail guards against.
fn random_suffix(len: usize) -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .to_uppercase()
        .chars()
        .take(len)
        .collect()
}

pub fn new_transaction_id() -> String {
    format!("TXN{}{}", Utc::now().timestamp_millis(), random_suffix(6))
}

pub fn new_student_id() -> String {
    format!("VJ{}{}", Utc::now().timestamp_millis(), random_suffix(4))
}

/// What the API hands back to the browser after a submission.
#[derive(Debug)]
pub struct IntakeOutcome {
    pub transaction_id: String,
    pub student_id: String,
    pub amount: BigDecimal,
    pub gateway: String,
    pub payment: InitiateOutcome,
    /// True when the gateway was skipped and the redirect is a local
    /// test destination.
    pub test_fallback: bool,
}

pub struct IntakeService {
    writer: Arc<DualStoreWriter>,
    settings: Arc<SettingsCache>,
    factory: Arc<dyn AdapterFactory>,
}

impl IntakeService {
    pub fn new(
        writer: Arc<DualStoreWriter>,
        settings: Arc<SettingsCache>,
        factory: Arc<dyn AdapterFactory>,
    ) -> Self {
        Self {
            writer,
            settings,
            factory,
        }
    }

    fn record_from_form(
        form: &IntakeForm,
        transaction_id: &str,
        student_id: &str,
        amount: BigDecimal,
    ) -> ApplicationRecord {
        ApplicationRecord {
            timestamp: Utc::now(),
            student_id: student_id.to_string(),
            transaction_id: transaction_id.to_string(),
            payment_status: PaymentStatus::Pending,
            amount,
            student_name: form.student_name.trim().to_string(),
            father_name: form.father_name.trim().to_string(),
            mother_name: form.mother_name.trim().to_string(),
            student_mobile: form.student_mobile.trim().to_string(),
            father_mobile: form.father_mobile.trim().to_string(),
            mother_mobile: form.mother_mobile.trim().to_string(),
            email: form.email.trim().to_string(),
            address: form.address.trim().to_string(),
            pincode: form.pincode.trim().to_string(),
            taluk: form.taluk.trim().to_string(),
            district: form.district.trim().to_string(),
            present_college: form.present_college.trim().to_string(),
            tenth_percentage: form.tenth_percentage.trim().to_string(),
            dd_representative: form.dd_representative.trim().to_string(),
            country_preference: form.country_preference.trim().to_string(),
            college_preference: form.college_preference.trim().to_string(),
            budget: form.budget.trim().to_string(),
            facilities: form.facilities.trim().to_string(),
        }
    }

    fn fallback_redirect(
        &self,
        origin: &str,
        transaction_id: &str,
        amount: &BigDecimal,
        gateway: &str,
    ) -> String {
        let origin = if origin.trim().is_empty() {
            "http://localhost:3000"
        } else {
            origin.trim_end_matches('/')
        };
        format!(
            "{origin}/payment/success?txnid={transaction_id}&amount={amount}&test=true&gateway={gateway}"
        )
    }

    /// Validate, persist, initiate. Storage comes before the gateway so a
    /// student is never charged for an application no store accepted.
    pub async fn submit(&self, form: IntakeForm) -> AppResult<IntakeOutcome> {
        validate(&form)?;

        let settings = self.settings.get();
        let amount = BigDecimal::from_str(settings.application_fee.trim())
            .unwrap_or_else(|_| {
                warn!(
                    configured = %settings.application_fee,
                    "unparseable application fee in settings, defaulting to 250"
                );
                BigDecimal::from(250)
            });

        let transaction_id = new_transaction_id();
        let student_id = new_student_id();
        let record = Self::record_from_form(&form, &transaction_id, &student_id, amount.clone());

        let report = self.writer.insert(&record).await;
        if !report.any_succeeded() {
            error!(
                transaction_id = %transaction_id,
                failures = ?report.failures,
                "both stores rejected the application, aborting before payment"
            );
            return Err(AppError::storage_unavailable(
                "application could not be recorded",
            ));
        }

        let gateway = self.factory.selected(&settings);

        if form.test_mode {
            info!(transaction_id = %transaction_id, "test mode submission, skipping gateway");
            let url = self.fallback_redirect(
                &settings.site_url,
                &transaction_id,
                &amount,
                gateway.as_str(),
            );
            return Ok(IntakeOutcome {
                transaction_id,
                student_id,
                amount,
                gateway: gateway.to_string(),
                payment: InitiateOutcome::redirect(url),
                test_fallback: true,
            });
        }

        let request = InitiateRequest {
            transaction_id: transaction_id.clone(),
            student_id: student_id.clone(),
            amount: amount.clone(),
            student_name: record.student_name.clone(),
            email: record.email.clone(),
            phone: record.student_mobile.clone(),
            product_info: format!("{} Application Fee", settings.application_name),
        };

        let initiation = match self.factory.adapter(&settings, gateway) {
            Ok(adapter) => adapter.initiate(&request).await,
            Err(e) => Err(e),
        };

        match initiation {
            Ok(payment) => Ok(IntakeOutcome {
                transaction_id,
                student_id,
                amount,
                gateway: gateway.to_string(),
                payment,
                test_fallback: false,
            }),
            Err(GatewayError::Validation { message }) => {
                Err(AppError::gateway(gateway.as_str(), message, false))
            }
            // The application is already on record at this point. Whatever
            // went wrong on the gateway side, the submitter gets the tagged
            // test redirect instead of an error page.
            Err(e) => {
                warn!(
                    gateway = %gateway,
                    transaction_id = %transaction_id,
                    error = %e,
                    "payment initiation failed, falling back to test redirect"
                );
                let url = self.fallback_redirect(
                    &settings.site_url,
                    &transaction_id,
                    &amount,
                    gateway.as_str(),
                );
                Ok(IntakeOutcome {
                    transaction_id,
                    student_id,
                    amount,
                    gateway: gateway.to_string(),
                    payment: InitiateOutcome::redirect(url),
                    test_fallback: true,
                })
            }
        }
    }
}

impl IntakeOutcome {
    pub fn to_response_body(&self) -> serde_json::Value {
        json!({
            "transactionId": self.transaction_id,
            "studentId": self.student_id,
            "amount": self.amount.to_string(),
            "paymentGateway": self.gateway,
            "test": self.test_fallback,
            "redirect": self.payment.redirect_url,
            "formFields": self.payment.form_post,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn valid_form() -> IntakeForm {
        IntakeForm {
            student_name: "Asha".to_string(),
            father_name: "Ravi".to_string(),
            mother_name: "Lakshmi".to_string(),
            student_mobile: "9876543210".to_string(),
            email: "asha@example.com".to_string(),
            address: "12 Main Road".to_string(),
            pincode: "560001".to_string(),
            taluk: "North".to_string(),
            district: "Bengaluru".to_string(),
            present_college: "City PU College".to_string(),
            tenth_percentage: "88.4".to_string(),
            country_preference: "India".to_string(),
            ..IntakeForm::default()
        }
    }

    #[test]
    fn valid_form_passes() {
        assert!(validate(&valid_form()).is_ok());
    }

    #[test]
    fn first_missing_field_is_named() {
        let mut form = valid_form();
        form.father_name = String::new();
        form.email = String::new();
        let err = validate(&form).unwrap_err();
        assert!(err.user_message().contains("fatherName"));
    }

    #[test]
    fn short_mobile_is_rejected() {
        let mut form = valid_form();
        form.student_mobile = "12345".to_string();
        assert!(validate(&form).is_err());
    }

    #[test]
    fn optional_parent_mobile_validated_when_present() {
        let mut form = valid_form();
        form.father_mobile = "12345".to_string();
        assert!(validate(&form).is_err());
        form.father_mobile = String::new();
        assert!(validate(&form).is_ok());
    }

    #[test]
    fn five_digit_pincode_is_rejected() {
        let mut form = valid_form();
        form.pincode = "12345".to_string();
        assert!(validate(&form).is_err());
    }

    #[test]
    fn percentage_bounds_are_inclusive() {
        let mut form = valid_form();
        form.tenth_percentage = "100".to_string();
        assert!(validate(&form).is_ok());
        form.tenth_percentage = "0".to_string();
        assert!(validate(&form).is_ok());
        form.tenth_percentage = "150".to_string();
        assert!(validate(&form).is_err());
        form.tenth_percentage = "-1".to_string();
        assert!(validate(&form).is_err());
    }

    #[test]
    fn generated_ids_carry_prefixes_and_stay_unique() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let txn = new_transaction_id();
            assert!(txn.starts_with("TXN"));
            assert!(seen.insert(txn), "transaction ids must not collide");
        }
        assert!(new_student_id().starts_with("VJ"));
    }
}
