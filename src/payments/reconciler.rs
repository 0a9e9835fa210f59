use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::{
    error::{PortalError, Result},
    payments::{
        analytics::{compute_analytics, PaymentAnalytics},
        import::{ImportedRow, PaymentCodeEntry, TransactionRow},
        normalize::{FeeCategory, PaymentMethod, TransactionStatus},
        outcome::{EntryError, ReconciliationOutcome, SyncOutcome},
        resolver::StudentResolver,
    },
    storage::{
        models::{
            FinancialInfo, PaymentCodeUpdate, ProviderSnapshot, Student, StudentId,
            TransactionFilter, TransactionRecord,
        },
        store::StudentStore,
    },
};

/// Who is running the import and in which currency amounts are booked
#[derive(Debug, Clone, PartialEq)]
pub struct PortalContext {
    pub operator: String,
    pub currency: String,
}

/// A payment entered directly by the bursar rather than imported
#[derive(Debug, Clone, PartialEq)]
pub struct ManualPayment {
    pub amount: f64,
    pub category: FeeCategory,
    pub method: PaymentMethod,
    pub paid_date: NaiveDate,
    pub reference: Option<String>,
    pub description: Option<String>,
}

pub struct PaymentReconciler {
    store: Arc<dyn StudentStore>,
    context: PortalContext,
    transaction_resolver: StudentResolver,
    sync_resolver: StudentResolver,
}

impl PaymentReconciler {
    pub fn new(store: Arc<dyn StudentStore>, context: PortalContext) -> Self {
        Self {
            transaction_resolver: StudentResolver::for_transactions(store.clone()),
            sync_resolver: StudentResolver::for_code_sync(store.clone()),
            store,
            context,
        }
    }

    pub fn context(&self) -> &PortalContext {
        &self.context
    }

    /// Reconcile a batch of provider transaction rows.
    ///
    /// Rows are processed in order. A failing row is recorded in the outcome
    /// and never stops the batch; only a failure to write the final import
    /// record is returned as an error.
    pub async fn reconcile(
        &self,
        source_name: &str,
        rows: &[TransactionRow],
    ) -> Result<ReconciliationOutcome> {
        let mut outcome = self.begin_import(source_name, rows.len());

        for (index, row) in rows.iter().enumerate() {
            self.apply_row(&mut outcome, index + 1, row).await;
        }

        self.finish_import(outcome).await
    }

    /// Reconcile rows read from an export file.
    ///
    /// Rows the reader rejected count as failed rows at their position.
    pub async fn reconcile_import(
        &self,
        source_name: &str,
        rows: &[ImportedRow],
    ) -> Result<ReconciliationOutcome> {
        let mut outcome = self.begin_import(source_name, rows.len());

        for (index, row) in rows.iter().enumerate() {
            match row {
                Ok(row) => self.apply_row(&mut outcome, index + 1, row).await,
                Err(rejected) => {
                    warn!(
                        "Row {} ({}) unreadable: {}",
                        rejected.row_index, rejected.identifier, rejected.message
                    );
                    outcome.record_failure(
                        rejected.row_index,
                        &rejected.identifier,
                        rejected.message.clone(),
                    );
                }
            }
        }

        self.finish_import(outcome).await
    }

    fn begin_import(&self, source_name: &str, total_rows: usize) -> ReconciliationOutcome {
        info!(
            "Reconciling {} transaction rows from {} (store: {})",
            total_rows,
            source_name,
            self.store.backend_tag()
        );
        ReconciliationOutcome::new(source_name, &self.context.operator, total_rows)
    }

    async fn apply_row(&self, outcome: &mut ReconciliationOutcome, row_index: usize, row: &TransactionRow) {
        match self.process_transaction(row).await {
            Ok(financial) => {
                debug!(
                    "Row {}: {} applied, balance now {} ({})",
                    row_index, row.amount, financial.current_balance, financial.payment_status
                );
                outcome.record_success(row.amount);
            }
            Err(e) => {
                warn!("Row {} ({}) failed: {}", row_index, row.identifier(), e);
                outcome.record_failure(row_index, row.identifier(), e.to_string());
            }
        }
    }

    async fn finish_import(&self, mut outcome: ReconciliationOutcome) -> Result<ReconciliationOutcome> {
        outcome.finish();

        self.store
            .create_import_record(&outcome)
            .await
            .map_err(|e| PortalError::BatchRecord(e.to_string()))?;

        info!(
            "Import complete: {} successful, {} failed, {} {} received",
            outcome.success_count, outcome.failure_count, outcome.total_amount, self.context.currency
        );

        Ok(outcome)
    }

    async fn process_transaction(&self, row: &TransactionRow) -> Result<FinancialInfo> {
        let student = self.transaction_resolver.resolve(&row.keys()).await?;
        validate_amount(row.amount)?;

        let transaction = self.build_transaction(row, &student);
        self.store
            .record_payment(&transaction)
            .await
            .map_err(into_persistence)
    }

    fn build_transaction(&self, row: &TransactionRow, student: &Student) -> TransactionRecord {
        TransactionRecord {
            id: None,
            student_id: student.id,
            category: FeeCategory::from_raw(&row.fee_type_raw),
            amount: row.amount,
            currency: self.context.currency.clone(),
            payment_method: PaymentMethod::from_raw(&row.payment_method_raw),
            status: TransactionStatus::from_raw(&row.status_raw),
            description: row.description.clone(),
            reference: row.reference.clone(),
            processed_by: self.context.operator.clone(),
            processed_at: Utc::now(),
            paid_date: row.payment_date,
            provider: Some(ProviderSnapshot {
                transaction_id: row.transaction_id.clone(),
                raw_status: row.status_raw.clone(),
                raw_method: row.payment_method_raw.clone(),
                raw_fee_type: row.fee_type_raw.clone(),
                provider_reference: row.provider_reference.clone(),
                parent_name: row.parent_name.clone(),
                parent_phone: row.parent_phone.clone(),
                payment_code: row.payment_code.clone().or_else(|| student.payment_code.clone()),
            }),
        }
    }

    /// Attach provider payment codes to student profiles
    pub async fn sync_identifiers(&self, entries: &[PaymentCodeEntry]) -> SyncOutcome {
        info!("Syncing {} payment codes", entries.len());

        let mut outcome = SyncOutcome {
            total_entries: entries.len(),
            ..SyncOutcome::default()
        };

        for entry in entries {
            match self.attach_payment_code(entry).await {
                Ok(student_id) => {
                    debug!("Payment code {} attached to student {}", entry.payment_code, student_id);
                    outcome.success_count += 1;
                }
                Err(e) => {
                    warn!("Payment code {} not attached: {}", entry.payment_code, e);
                    outcome.failure_count += 1;
                    outcome.errors.push(EntryError {
                        payment_code: entry.payment_code.clone(),
                        student_name: entry.student_name.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "Payment code sync complete: {} mapped, {} failed",
            outcome.success_count, outcome.failure_count
        );
        outcome
    }

    async fn attach_payment_code(&self, entry: &PaymentCodeEntry) -> Result<StudentId> {
        let student = self.sync_resolver.resolve(&entry.keys()).await?;

        let update = PaymentCodeUpdate {
            payment_code: entry.payment_code.clone(),
            payment_instructions: format!(
                "Use payment code {} when making payments via School Pay Uganda",
                entry.payment_code
            ),
            qr_code_url: entry.qr_code_url.clone(),
            synced_at: Utc::now(),
        };

        self.store
            .update_payment_code(student.id, &update)
            .await
            .map_err(into_persistence)?;
        Ok(student.id)
    }

    /// Record a payment taken at the bursar's desk
    pub async fn record_manual_payment(
        &self,
        student_id: StudentId,
        payment: &ManualPayment,
    ) -> Result<FinancialInfo> {
        validate_amount(payment.amount)?;

        let transaction = TransactionRecord {
            id: None,
            student_id,
            category: payment.category,
            amount: payment.amount,
            currency: self.context.currency.clone(),
            payment_method: payment.method,
            status: TransactionStatus::Completed,
            description: payment.description.clone(),
            reference: payment.reference.clone(),
            processed_by: self.context.operator.clone(),
            processed_at: Utc::now(),
            paid_date: payment.paid_date,
            provider: None,
        };

        let financial = self.store.record_payment(&transaction).await?;
        info!(
            "Recorded {} {} for student {}, balance {}",
            payment.amount, self.context.currency, student_id, financial.current_balance
        );
        Ok(financial)
    }

    /// Analytics over completed payments
    pub async fn payment_analytics(&self) -> Result<PaymentAnalytics> {
        let transactions = self
            .store
            .query_transactions(&TransactionFilter::completed())
            .await?;
        Ok(compute_analytics(&transactions))
    }
}

fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(PortalError::InvalidAmount(amount.to_string()));
    }
    Ok(())
}

/// Store failures other than a missing student surface as persistence errors
fn into_persistence(error: PortalError) -> PortalError {
    match error {
        PortalError::StudentNotFound(_) | PortalError::Persistence(_) => error,
        other => PortalError::Persistence(other.to_string()),
    }
}
