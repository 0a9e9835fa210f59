use serde::{Deserialize, Serialize};
use chrono::{DateTime, NaiveDate, Utc};
use crate::{
    error::UnknownVariant,
    payments::normalize::{FeeCategory, PaymentMethod, TransactionStatus},
};

pub type StudentId = i64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub full_name: String,
    pub provider_student_id: Option<String>,
    pub payment_code: Option<String>,
    pub financial: FinancialInfo,
    pub integration: ProviderIntegration,
}

/// Input for enrolling a student in the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStudent {
    pub full_name: String,
    pub provider_student_id: Option<String>,
    pub total_fees_owed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialInfo {
    pub total_fees_owed: f64,
    pub total_fees_paid: f64,
    pub current_balance: f64,
    pub last_payment_date: Option<NaiveDate>,
    pub payment_status: PaymentStatus,
}

impl FinancialInfo {
    pub fn new(total_fees_owed: f64) -> Self {
        Self {
            total_fees_owed,
            total_fees_paid: 0.0,
            current_balance: total_fees_owed,
            last_payment_date: None,
            payment_status: PaymentStatus::Unpaid,
        }
    }

    /// Add a payment to the running totals.
    ///
    /// Not idempotent: applying the same payment twice counts it twice.
    pub fn apply_payment(&mut self, amount: f64, paid_on: NaiveDate) {
        self.total_fees_paid += amount;
        self.current_balance = self.total_fees_owed - self.total_fees_paid;
        self.last_payment_date = Some(paid_on);
        self.payment_status = if self.current_balance <= 0.0 {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Partial
        };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Paid => write!(f, "paid"),
            PaymentStatus::Partial => write!(f, "partial"),
            PaymentStatus::Unpaid => write!(f, "unpaid"),
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "paid" => Ok(PaymentStatus::Paid),
            "partial" => Ok(PaymentStatus::Partial),
            "unpaid" => Ok(PaymentStatus::Unpaid),
            other => Err(UnknownVariant::new("payment status", other)),
        }
    }
}

/// Payment-provider details attached to a student profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderIntegration {
    pub payment_instructions: Option<String>,
    pub qr_code_url: Option<String>,
    pub last_sync_date: Option<DateTime<Utc>>,
    pub sync_status: Option<String>,
}

/// Equality lookups the resolver issues against the student store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudentLookup {
    PaymentCode(String),
    ProviderId(String),
    FullName(String),
}

impl StudentLookup {
    pub fn value(&self) -> &str {
        match self {
            StudentLookup::PaymentCode(v)
            | StudentLookup::ProviderId(v)
            | StudentLookup::FullName(v) => v,
        }
    }

    pub fn matches(&self, student: &Student) -> bool {
        match self {
            StudentLookup::PaymentCode(code) => student.payment_code.as_deref() == Some(code),
            StudentLookup::ProviderId(id) => student.provider_student_id.as_deref() == Some(id),
            StudentLookup::FullName(name) => student.full_name == *name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCodeUpdate {
    pub payment_code: String,
    pub payment_instructions: String,
    pub qr_code_url: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// A fee payment booked against a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Option<i64>,
    pub student_id: StudentId,
    pub category: FeeCategory,
    pub amount: f64,
    pub currency: String,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub description: Option<String>,
    pub reference: Option<String>,
    pub processed_by: String,
    pub processed_at: DateTime<Utc>,
    pub paid_date: NaiveDate,
    /// Raw provider values, present only for imported payments
    pub provider: Option<ProviderSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub transaction_id: String,
    pub raw_status: String,
    pub raw_method: String,
    pub raw_fee_type: String,
    pub provider_reference: Option<String>,
    pub parent_name: Option<String>,
    pub parent_phone: Option<String>,
    pub payment_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionFilter {
    pub status: Option<TransactionStatus>,
    pub student_id: Option<StudentId>,
}

impl TransactionFilter {
    /// Completed payments, the set payment analytics runs over
    pub fn completed() -> Self {
        Self {
            status: Some(TransactionStatus::Completed),
            student_id: None,
        }
    }

    pub fn matches(&self, transaction: &TransactionRecord) -> bool {
        self.status.map_or(true, |status| transaction.status == status)
            && self.student_id.map_or(true, |id| transaction.student_id == id)
    }
}
