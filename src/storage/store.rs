use async_trait::async_trait;
use crate::{
    error::Result,
    payments::outcome::ReconciliationOutcome,
    storage::models::{
        FinancialInfo, NewStudent, PaymentCodeUpdate, Student, StudentId, StudentLookup,
        TransactionFilter, TransactionRecord,
    },
};

/// Student and financial record store the payment core works against.
///
/// Lookups are equality-only. `record_payment` persists a transaction and
/// applies it to the owning student's balance as one operation.
#[async_trait]
pub trait StudentStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    async fn insert_student(&self, student: &NewStudent) -> Result<StudentId>;

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>>;

    async fn list_students(&self) -> Result<Vec<Student>>;

    async fn find_students(&self, lookup: &StudentLookup) -> Result<Vec<Student>>;

    async fn update_payment_code(&self, id: StudentId, update: &PaymentCodeUpdate) -> Result<()>;

    /// Persist the transaction and return the student's updated financial record.
    async fn record_payment(&self, transaction: &TransactionRecord) -> Result<FinancialInfo>;

    async fn create_import_record(&self, outcome: &ReconciliationOutcome) -> Result<i64>;

    async fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>>;
}
