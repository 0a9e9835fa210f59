use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use crate::{
    error::{PortalError, Result},
    payments::outcome::ReconciliationOutcome,
    storage::{
        models::{
            FinancialInfo, NewStudent, PaymentCodeUpdate, ProviderIntegration, Student, StudentId,
            StudentLookup, TransactionFilter, TransactionRecord,
        },
        store::StudentStore,
    },
};

#[derive(Default)]
struct MemoryState {
    students: BTreeMap<StudentId, Student>,
    transactions: Vec<TransactionRecord>,
    import_records: Vec<ReconciliationOutcome>,
}

/// In-process store used for dry runs and tests
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    failing_students: Mutex<HashSet<StudentId>>,
    fail_import_records: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from a snapshot of another store
    pub fn from_students(students: Vec<Student>) -> Self {
        let state = MemoryState {
            students: students.into_iter().map(|s| (s.id, s)).collect(),
            ..MemoryState::default()
        };
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Make every payment write for this student fail
    pub async fn fail_payments_for(&self, id: StudentId) {
        self.failing_students.lock().await.insert(id);
    }

    /// Make import-record writes fail
    pub fn fail_import_records(&self, fail: bool) {
        self.fail_import_records.store(fail, Ordering::Relaxed);
    }

    pub async fn transactions(&self) -> Vec<TransactionRecord> {
        self.state.lock().await.transactions.clone()
    }

    pub async fn import_records(&self) -> Vec<ReconciliationOutcome> {
        self.state.lock().await.import_records.clone()
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn insert_student(&self, student: &NewStudent) -> Result<StudentId> {
        let mut state = self.state.lock().await;
        let id = state.students.keys().next_back().map_or(1, |last| last + 1);
        state.students.insert(
            id,
            Student {
                id,
                full_name: student.full_name.clone(),
                provider_student_id: student.provider_student_id.clone(),
                payment_code: None,
                financial: FinancialInfo::new(student.total_fees_owed),
                integration: ProviderIntegration::default(),
            },
        );
        Ok(id)
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        Ok(self.state.lock().await.students.get(&id).cloned())
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        Ok(self.state.lock().await.students.values().cloned().collect())
    }

    async fn find_students(&self, lookup: &StudentLookup) -> Result<Vec<Student>> {
        Ok(self
            .state
            .lock()
            .await
            .students
            .values()
            .filter(|student| lookup.matches(student))
            .cloned()
            .collect())
    }

    async fn update_payment_code(&self, id: StudentId, update: &PaymentCodeUpdate) -> Result<()> {
        let mut state = self.state.lock().await;
        let student = state
            .students
            .get_mut(&id)
            .ok_or_else(|| PortalError::StudentNotFound(format!("id {}", id)))?;

        student.payment_code = Some(update.payment_code.clone());
        student.integration.payment_instructions = Some(update.payment_instructions.clone());
        student.integration.qr_code_url = update.qr_code_url.clone();
        student.integration.last_sync_date = Some(update.synced_at);
        student.integration.sync_status = Some("successful".to_string());
        Ok(())
    }

    async fn record_payment(&self, transaction: &TransactionRecord) -> Result<FinancialInfo> {
        if self.failing_students.lock().await.contains(&transaction.student_id) {
            return Err(PortalError::Persistence(format!(
                "write rejected for student {}",
                transaction.student_id
            )));
        }

        let mut state = self.state.lock().await;
        let next_id = state.transactions.len() as i64 + 1;

        let student = state
            .students
            .get_mut(&transaction.student_id)
            .ok_or_else(|| PortalError::StudentNotFound(format!("id {}", transaction.student_id)))?;
        student
            .financial
            .apply_payment(transaction.amount, transaction.paid_date);
        student.integration.last_sync_date = Some(Utc::now());
        student.integration.sync_status = Some("successful".to_string());
        let financial = student.financial.clone();

        let mut stored = transaction.clone();
        stored.id = Some(next_id);
        state.transactions.push(stored);

        Ok(financial)
    }

    async fn create_import_record(&self, outcome: &ReconciliationOutcome) -> Result<i64> {
        if self.fail_import_records.load(Ordering::Relaxed) {
            return Err(PortalError::Persistence("import record store unavailable".to_string()));
        }

        let mut state = self.state.lock().await;
        state.import_records.push(outcome.clone());
        Ok(state.import_records.len() as i64)
    }

    async fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        Ok(self
            .state
            .lock()
            .await
            .transactions
            .iter()
            .filter(|transaction| filter.matches(transaction))
            .cloned()
            .collect())
    }
}
