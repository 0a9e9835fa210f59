//! Provider export files → structured rows.
//!
//! Exports are CSV with a header row using the provider's column names.

use serde::{Deserialize, Deserializer, Serialize};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;
use csv::StringRecord;
use crate::{
    error::Result,
    payments::{outcome::RowError, resolver::StudentKeys},
};

/// One line of a provider transaction export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    #[serde(rename = "Transaction ID")]
    pub transaction_id: String,
    #[serde(rename = "Payment Code", default)]
    pub payment_code: Option<String>,
    #[serde(rename = "Student ID", default)]
    pub provider_student_id: Option<String>,
    #[serde(rename = "Student Name", default)]
    pub student_name: Option<String>,
    #[serde(rename = "Amount", deserialize_with = "deserialize_amount")]
    pub amount: f64,
    #[serde(rename = "Fee Type", default)]
    pub fee_type_raw: String,
    #[serde(rename = "Payment Method", default)]
    pub payment_method_raw: String,
    #[serde(rename = "Status", default)]
    pub status_raw: String,
    #[serde(rename = "Payment Date")]
    pub payment_date: NaiveDate,
    #[serde(rename = "Reference", default)]
    pub reference: Option<String>,
    #[serde(rename = "School Pay Reference", default)]
    pub provider_reference: Option<String>,
    #[serde(rename = "Description", default)]
    pub description: Option<String>,
    #[serde(rename = "Parent Name", default)]
    pub parent_name: Option<String>,
    #[serde(rename = "Parent Phone", default)]
    pub parent_phone: Option<String>,
}

impl TransactionRow {
    pub fn keys(&self) -> StudentKeys<'_> {
        StudentKeys {
            payment_code: self.payment_code.as_deref(),
            provider_student_id: self.provider_student_id.as_deref(),
            student_name: self.student_name.as_deref(),
        }
    }

    /// Best identifier for error reports
    pub fn identifier(&self) -> &str {
        [
            self.payment_code.as_deref(),
            self.provider_student_id.as_deref(),
            self.student_name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or(self.transaction_id.as_str())
    }
}

/// One line of a provider payment-code export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentCodeEntry {
    #[serde(rename = "Student ID", default)]
    pub provider_student_id: Option<String>,
    #[serde(rename = "Student Name", default)]
    pub student_name: Option<String>,
    #[serde(rename = "Payment Code")]
    pub payment_code: String,
    #[serde(rename = "QR Code URL", default)]
    pub qr_code_url: Option<String>,
}

impl PaymentCodeEntry {
    pub fn keys(&self) -> StudentKeys<'_> {
        StudentKeys {
            payment_code: None,
            provider_student_id: self.provider_student_id.as_deref(),
            student_name: self.student_name.as_deref(),
        }
    }
}

/// Amounts arrive as "150000", "150,000" or "150000.50"
fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .map_err(|e| serde::de::Error::custom(format!("invalid amount {:?}: {}", raw, e)))
}

/// A transaction export line: parsed, or rejected with the reason
pub type ImportedRow = std::result::Result<TransactionRow, RowError>;

const IDENTIFIER_COLUMNS: [&str; 4] = ["Payment Code", "Student ID", "Student Name", "Transaction ID"];

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Best identifier for a line that did not parse
fn raw_identifier(headers: &StringRecord, record: &StringRecord) -> String {
    IDENTIFIER_COLUMNS
        .iter()
        .filter_map(|column| headers.iter().position(|header| header == *column))
        .filter_map(|idx| record.get(idx))
        .find(|value| !value.is_empty())
        .unwrap_or("-")
        .to_string()
}

/// Read a transaction export line by line.
///
/// A line that fails to parse becomes a rejected row at its 1-based position;
/// only I/O errors and an unreadable header fail the whole read.
pub fn read_transaction_rows<R: Read>(reader: R) -> Result<Vec<ImportedRow>> {
    let mut reader = csv_reader(reader);
    let headers = reader.headers()?.clone();
    let mut record = StringRecord::new();
    let mut rows = Vec::new();

    loop {
        let row_index = rows.len() + 1;
        let parsed = match reader.read_record(&mut record) {
            Ok(false) => break,
            Ok(true) => record.deserialize::<TransactionRow>(Some(&headers)),
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(_)) => return Err(e.into()),
            Err(e) => Err(e),
        };

        rows.push(parsed.map_err(|e| RowError {
            row_index,
            identifier: raw_identifier(&headers, &record),
            message: e.to_string(),
        }));
    }

    Ok(rows)
}

pub fn read_payment_codes<R: Read>(reader: R) -> Result<Vec<PaymentCodeEntry>> {
    let entries = csv_reader(reader)
        .deserialize()
        .collect::<std::result::Result<Vec<PaymentCodeEntry>, csv::Error>>()?;
    Ok(entries)
}

pub fn read_transaction_file(path: &Path) -> Result<Vec<ImportedRow>> {
    let rows = read_transaction_rows(File::open(path)?)?;
    let rejected = rows.iter().filter(|row| row.is_err()).count();
    debug!(
        "Read {} transaction rows from {} ({} unreadable)",
        rows.len(),
        path.display(),
        rejected
    );
    Ok(rows)
}

pub fn read_payment_code_file(path: &Path) -> Result<Vec<PaymentCodeEntry>> {
    let entries = read_payment_codes(File::open(path)?)?;
    debug!("Read {} payment codes from {}", entries.len(), path.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = "\
Transaction ID,Payment Code,Student ID,Student Name,Amount,Fee Type,Payment Method,Status,Payment Date,Reference
TX-1001,1002003,,Auma Patricia,\"150,000\",Tuition,Mobile Money,Completed,2024-02-12,MM-77
TX-1002,,SP-002,Ssempa Daniel,45000.50,Meals,Cash,Pending,2024-03-01,
";

    fn parsed(rows: Vec<ImportedRow>) -> Vec<TransactionRow> {
        rows.into_iter().map(|row| row.unwrap()).collect()
    }

    #[test]
    fn test_read_transaction_rows() {
        let rows = parsed(read_transaction_rows(EXPORT.as_bytes()).unwrap());
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].transaction_id, "TX-1001");
        assert_eq!(rows[0].payment_code.as_deref(), Some("1002003"));
        assert_eq!(rows[0].amount, 150_000.0);
        assert_eq!(rows[0].payment_date, NaiveDate::from_ymd_opt(2024, 2, 12).unwrap());
        assert_eq!(rows[0].reference.as_deref(), Some("MM-77"));
        assert!(rows[0].parent_name.is_none());

        assert!(rows[1].payment_code.is_none());
        assert_eq!(rows[1].amount, 45_000.5);
        assert_eq!(rows[1].identifier(), "SP-002");
    }

    #[test]
    fn test_bad_line_is_rejected_alone() {
        let export = "\
Transaction ID,Student Name,Amount,Payment Date
TX-1,Auma Patricia,1000,2024-01-01
TX-2,Ssempa Daniel,lots,2024-01-02
TX-3,Opio Peter,3000,2024-01-03
TX-4,Nakato Grace,4000,someday
";
        let rows = read_transaction_rows(export.as_bytes()).unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].as_ref().unwrap().transaction_id, "TX-1");
        assert_eq!(rows[2].as_ref().unwrap().amount, 3000.0);

        let bad_amount = rows[1].as_ref().unwrap_err();
        assert_eq!(bad_amount.row_index, 2);
        assert_eq!(bad_amount.identifier, "Ssempa Daniel");
        assert!(bad_amount.message.contains("invalid amount"));

        let bad_date = rows[3].as_ref().unwrap_err();
        assert_eq!(bad_date.row_index, 4);
        assert_eq!(bad_date.identifier, "Nakato Grace");
    }

    #[test]
    fn test_short_line_is_rejected_alone() {
        let export = "\
Transaction ID,Student Name,Amount,Payment Date
TX-1,Auma Patricia
TX-2,Ssempa Daniel,2000,2024-01-02
";
        let rows = read_transaction_rows(export.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].as_ref().unwrap_err().row_index, 1);
        assert_eq!(rows[1].as_ref().unwrap().amount, 2000.0);
    }

    #[test]
    fn test_identifier_falls_back_to_transaction_id() {
        let export = "\
Transaction ID,Amount,Payment Date
TX-9,1000,2024-01-01
";
        let rows = parsed(read_transaction_rows(export.as_bytes()).unwrap());
        assert_eq!(rows[0].identifier(), "TX-9");
        assert_eq!(rows[0].fee_type_raw, "");
    }

    #[test]
    fn test_read_payment_codes() {
        let export = "\
Student ID,Student Name,Payment Code,QR Code URL
SP-001,Auma Patricia,1002003,
,Ssempa Daniel,1002004,https://pay.example/qr/1002004
";
        let entries = read_payment_codes(export.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].keys().provider_student_id, Some("SP-001"));
        assert!(entries[1].provider_student_id.is_none());
        assert_eq!(
            entries[1].qr_code_url.as_deref(),
            Some("https://pay.example/qr/1002004")
        );
    }
}
