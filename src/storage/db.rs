use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use chrono::Utc;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
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

const STUDENT_COLUMNS: &str = "id, full_name, provider_student_id, payment_code, \
     total_fees_owed, total_fees_paid, current_balance, last_payment_date, payment_status, \
     payment_instructions, qr_code_url, last_sync_date, sync_status";

const TRANSACTION_COLUMNS: &str = "id, student_id, category, amount, currency, \
     payment_method, status, description, reference, processed_by, processed_at, paid_date, \
     provider_data";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| PortalError::Persistence("database connection lock poisoned".to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS students (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                full_name TEXT NOT NULL,
                provider_student_id TEXT,
                payment_code TEXT,
                total_fees_owed REAL NOT NULL,
                total_fees_paid REAL NOT NULL DEFAULT 0,
                current_balance REAL NOT NULL,
                last_payment_date TEXT,
                payment_status TEXT NOT NULL,
                payment_instructions TEXT,
                qr_code_url TEXT,
                last_sync_date TEXT,
                sync_status TEXT
            );

            CREATE TABLE IF NOT EXISTS financial_transactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                student_id INTEGER NOT NULL,
                category TEXT NOT NULL,
                amount REAL NOT NULL,
                currency TEXT NOT NULL,
                payment_method TEXT NOT NULL,
                status TEXT NOT NULL,
                description TEXT,
                reference TEXT,
                processed_by TEXT NOT NULL,
                processed_at TEXT NOT NULL,
                paid_date TEXT NOT NULL,
                provider_data TEXT,
                FOREIGN KEY (student_id) REFERENCES students(id)
            );

            CREATE TABLE IF NOT EXISTS import_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_name TEXT NOT NULL,
                imported_by TEXT NOT NULL,
                import_date TEXT NOT NULL,
                total_rows INTEGER NOT NULL,
                success_count INTEGER NOT NULL,
                failure_count INTEGER NOT NULL,
                total_amount REAL NOT NULL,
                status TEXT NOT NULL,
                errors TEXT NOT NULL
            );

            -- Resolver lookups
            CREATE INDEX IF NOT EXISTS idx_students_payment_code ON students(payment_code);
            CREATE INDEX IF NOT EXISTS idx_students_provider_id ON students(provider_student_id);
            CREATE INDEX IF NOT EXISTS idx_students_full_name ON students(full_name);
            CREATE INDEX IF NOT EXISTS idx_transactions_status
                ON financial_transactions(status);",
        )?;

        Ok(())
    }

    /// Number of import records written so far
    pub fn import_record_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM import_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn parse_column<T>(idx: usize, text: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_optional<T>(idx: usize, text: Option<String>) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    text.map(|value| parse_column(idx, &value)).transpose()
}

fn student_from_row(row: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: row.get(0)?,
        full_name: row.get(1)?,
        provider_student_id: row.get(2)?,
        payment_code: row.get(3)?,
        financial: FinancialInfo {
            total_fees_owed: row.get(4)?,
            total_fees_paid: row.get(5)?,
            current_balance: row.get(6)?,
            last_payment_date: parse_optional(7, row.get(7)?)?,
            payment_status: parse_column(8, &row.get::<_, String>(8)?)?,
        },
        integration: ProviderIntegration {
            payment_instructions: row.get(9)?,
            qr_code_url: row.get(10)?,
            last_sync_date: parse_optional(11, row.get(11)?)?,
            sync_status: row.get(12)?,
        },
    })
}

fn transaction_from_row(row: &Row<'_>) -> rusqlite::Result<TransactionRecord> {
    let provider = row
        .get::<_, Option<String>>(12)?
        .map(|json| {
            serde_json::from_str(&json).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(12, rusqlite::types::Type::Text, Box::new(e))
            })
        })
        .transpose()?;

    Ok(TransactionRecord {
        id: row.get(0)?,
        student_id: row.get(1)?,
        category: parse_column(2, &row.get::<_, String>(2)?)?,
        amount: row.get(3)?,
        currency: row.get(4)?,
        payment_method: parse_column(5, &row.get::<_, String>(5)?)?,
        status: parse_column(6, &row.get::<_, String>(6)?)?,
        description: row.get(7)?,
        reference: row.get(8)?,
        processed_by: row.get(9)?,
        processed_at: parse_column(10, &row.get::<_, String>(10)?)?,
        paid_date: parse_column(11, &row.get::<_, String>(11)?)?,
        provider,
    })
}

#[async_trait]
impl StudentStore for SqliteStore {
    fn backend_tag(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_student(&self, student: &NewStudent) -> Result<StudentId> {
        let conn = self.conn()?;
        let financial = FinancialInfo::new(student.total_fees_owed);

        conn.execute(
            "INSERT INTO students
             (full_name, provider_student_id, total_fees_owed, total_fees_paid, current_balance, payment_status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                student.full_name,
                student.provider_student_id,
                financial.total_fees_owed,
                financial.total_fees_paid,
                financial.current_balance,
                financial.payment_status.to_string(),
            ],
        )?;

        Ok(conn.last_insert_rowid())
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        let conn = self.conn()?;
        let student = conn
            .query_row(
                &format!("SELECT {} FROM students WHERE id = ?1", STUDENT_COLUMNS),
                [id],
                student_from_row,
            )
            .optional()?;
        Ok(student)
    }

    async fn list_students(&self) -> Result<Vec<Student>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM students ORDER BY id", STUDENT_COLUMNS))?;
        let students = stmt
            .query_map([], student_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(students)
    }

    async fn find_students(&self, lookup: &StudentLookup) -> Result<Vec<Student>> {
        let column = match lookup {
            StudentLookup::PaymentCode(_) => "payment_code",
            StudentLookup::ProviderId(_) => "provider_student_id",
            StudentLookup::FullName(_) => "full_name",
        };

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM students WHERE {} = ?1 ORDER BY id",
            STUDENT_COLUMNS, column
        ))?;
        let students = stmt
            .query_map([lookup.value()], student_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!("Lookup {:?} matched {} students", lookup, students.len());
        Ok(students)
    }

    async fn update_payment_code(&self, id: StudentId, update: &PaymentCodeUpdate) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE students
             SET payment_code = ?1, payment_instructions = ?2, qr_code_url = ?3,
                 last_sync_date = ?4, sync_status = 'successful'
             WHERE id = ?5",
            params![
                update.payment_code,
                update.payment_instructions,
                update.qr_code_url,
                update.synced_at.to_rfc3339(),
                id,
            ],
        )?;

        if changed == 0 {
            return Err(PortalError::StudentNotFound(format!("id {}", id)));
        }
        Ok(())
    }

    async fn record_payment(&self, transaction: &TransactionRecord) -> Result<FinancialInfo> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let mut financial = tx
            .query_row(
                &format!("SELECT {} FROM students WHERE id = ?1", STUDENT_COLUMNS),
                [transaction.student_id],
                student_from_row,
            )
            .optional()?
            .ok_or_else(|| PortalError::StudentNotFound(format!("id {}", transaction.student_id)))?
            .financial;

        let provider_data = transaction
            .provider
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            "INSERT INTO financial_transactions
             (student_id, category, amount, currency, payment_method, status, description,
              reference, processed_by, processed_at, paid_date, provider_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                transaction.student_id,
                transaction.category.as_str(),
                transaction.amount,
                transaction.currency,
                transaction.payment_method.as_str(),
                transaction.status.as_str(),
                transaction.description,
                transaction.reference,
                transaction.processed_by,
                transaction.processed_at.to_rfc3339(),
                transaction.paid_date.to_string(),
                provider_data,
            ],
        )?;

        financial.apply_payment(transaction.amount, transaction.paid_date);

        tx.execute(
            "UPDATE students
             SET total_fees_paid = ?1, current_balance = ?2, last_payment_date = ?3,
                 payment_status = ?4, last_sync_date = ?5, sync_status = 'successful'
             WHERE id = ?6",
            params![
                financial.total_fees_paid,
                financial.current_balance,
                financial.last_payment_date.map(|d| d.to_string()),
                financial.payment_status.to_string(),
                Utc::now().to_rfc3339(),
                transaction.student_id,
            ],
        )?;

        tx.commit()?;
        Ok(financial)
    }

    async fn create_import_record(&self, outcome: &ReconciliationOutcome) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO import_records
             (source_name, imported_by, import_date, total_rows, success_count, failure_count,
              total_amount, status, errors)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                outcome.source_name,
                outcome.imported_by,
                outcome.import_date.to_rfc3339(),
                outcome.total_rows as i64,
                outcome.success_count as i64,
                outcome.failure_count as i64,
                outcome.total_amount,
                outcome.status.to_string(),
                serde_json::to_string(&outcome.errors)?,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn query_transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM financial_transactions
             WHERE (?1 IS NULL OR status = ?1)
               AND (?2 IS NULL OR student_id = ?2)
             ORDER BY paid_date DESC, id DESC",
            TRANSACTION_COLUMNS
        ))?;

        let transactions = stmt
            .query_map(
                params![
                    filter.status.map(|s| s.as_str()),
                    filter.student_id,
                ],
                transaction_from_row,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use crate::payments::normalize::{FeeCategory, PaymentMethod, TransactionStatus};
    use crate::storage::models::{PaymentStatus, ProviderSnapshot};

    fn new_student(name: &str, provider_id: Option<&str>, owed: f64) -> NewStudent {
        NewStudent {
            full_name: name.to_string(),
            provider_student_id: provider_id.map(str::to_string),
            total_fees_owed: owed,
        }
    }

    fn payment(student_id: StudentId, amount: f64, status: TransactionStatus) -> TransactionRecord {
        TransactionRecord {
            id: None,
            student_id,
            category: FeeCategory::TuitionFee,
            amount,
            currency: "UGX".to_string(),
            payment_method: PaymentMethod::MobileMoney,
            status,
            description: None,
            reference: Some("REF-1".to_string()),
            processed_by: "bursar".to_string(),
            processed_at: Utc::now(),
            paid_date: NaiveDate::from_ymd_opt(2024, 5, 14).unwrap(),
            provider: Some(ProviderSnapshot {
                transaction_id: "TX-1".to_string(),
                raw_status: "Completed".to_string(),
                raw_method: "Mobile Money".to_string(),
                raw_fee_type: "Tuition".to_string(),
                provider_reference: None,
                parent_name: Some("Okello James".to_string()),
                parent_phone: None,
                payment_code: Some("PC-1".to_string()),
            }),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_students() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert_student(&new_student("Achieng Grace", Some("SP-01"), 600_000.0))
            .await
            .unwrap();

        let student = store.get_student(id).await.unwrap().unwrap();
        assert_eq!(student.full_name, "Achieng Grace");
        assert_eq!(student.financial.current_balance, 600_000.0);
        assert_eq!(student.financial.payment_status, PaymentStatus::Unpaid);

        let by_provider = store
            .find_students(&StudentLookup::ProviderId("SP-01".into()))
            .await
            .unwrap();
        assert_eq!(by_provider.len(), 1);

        let by_code = store
            .find_students(&StudentLookup::PaymentCode("PC-1".into()))
            .await
            .unwrap();
        assert!(by_code.is_empty());

        assert!(store.get_student(id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_payment_code() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert_student(&new_student("Mugisha Brian", None, 0.0))
            .await
            .unwrap();

        let update = PaymentCodeUpdate {
            payment_code: "PC-9".to_string(),
            payment_instructions: "Use payment code PC-9".to_string(),
            qr_code_url: None,
            synced_at: Utc::now(),
        };
        store.update_payment_code(id, &update).await.unwrap();

        let found = store
            .find_students(&StudentLookup::PaymentCode("PC-9".into()))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].integration.sync_status.as_deref(), Some("successful"));

        let missing = store.update_payment_code(id + 1, &update).await;
        assert!(matches!(missing, Err(PortalError::StudentNotFound(_))));
    }

    #[tokio::test]
    async fn test_record_payment_updates_balance_atomically() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert_student(&new_student("Namubiru Joan", None, 500_000.0))
            .await
            .unwrap();

        let financial = store
            .record_payment(&payment(id, 200_000.0, TransactionStatus::Completed))
            .await
            .unwrap();
        assert_eq!(financial.current_balance, 300_000.0);
        assert_eq!(financial.payment_status, PaymentStatus::Partial);

        let financial = store
            .record_payment(&payment(id, 300_000.0, TransactionStatus::Completed))
            .await
            .unwrap();
        assert_eq!(financial.current_balance, 0.0);
        assert_eq!(financial.payment_status, PaymentStatus::Paid);

        let stored = store.get_student(id).await.unwrap().unwrap();
        assert_eq!(stored.financial, financial);

        let transactions = store
            .query_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(transactions.len(), 2);
        assert_eq!(
            transactions[0].provider.as_ref().unwrap().parent_name.as_deref(),
            Some("Okello James")
        );
    }

    #[tokio::test]
    async fn test_record_payment_for_missing_student_writes_nothing() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store
            .record_payment(&payment(42, 1_000.0, TransactionStatus::Completed))
            .await;
        assert!(matches!(result, Err(PortalError::StudentNotFound(_))));

        let transactions = store
            .query_transactions(&TransactionFilter::default())
            .await
            .unwrap();
        assert!(transactions.is_empty());
    }

    #[tokio::test]
    async fn test_query_transactions_filters_by_status() {
        let store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert_student(&new_student("Kato Ivan", None, 100_000.0))
            .await
            .unwrap();

        store
            .record_payment(&payment(id, 10_000.0, TransactionStatus::Completed))
            .await
            .unwrap();
        store
            .record_payment(&payment(id, 20_000.0, TransactionStatus::Pending))
            .await
            .unwrap();

        let completed = store
            .query_transactions(&TransactionFilter::completed())
            .await
            .unwrap();
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].amount, 10_000.0);
    }

    #[tokio::test]
    async fn test_create_import_record() {
        let store = SqliteStore::in_memory().unwrap();
        let mut outcome = ReconciliationOutcome::new("june.csv", "bursar", 1);
        outcome.record_failure(1, "PC-404", "Student not found".to_string());
        outcome.finish();

        let id = store.create_import_record(&outcome).await.unwrap();
        assert!(id > 0);
        assert_eq!(store.import_record_count().unwrap(), 1);
    }
}
