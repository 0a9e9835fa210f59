use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};
use colored::Colorize;

/// One failed import row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based position of the row in the batch
    pub row_index: usize,
    pub identifier: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Processing,
    Completed,
    CompletedWithErrors,
}

impl std::fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportStatus::Processing => write!(f, "processing"),
            ImportStatus::Completed => write!(f, "completed"),
            ImportStatus::CompletedWithErrors => write!(f, "completed_with_errors"),
        }
    }
}

impl std::str::FromStr for ImportStatus {
    type Err = crate::error::UnknownVariant;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "processing" => Ok(ImportStatus::Processing),
            "completed" => Ok(ImportStatus::Completed),
            "completed_with_errors" => Ok(ImportStatus::CompletedWithErrors),
            other => Err(crate::error::UnknownVariant::new("import status", other)),
        }
    }
}

/// Summary of a transaction import, persisted as the batch's import record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub source_name: String,
    pub imported_by: String,
    pub import_date: DateTime<Utc>,
    pub total_rows: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub total_amount: f64,
    pub status: ImportStatus,
    pub errors: Vec<RowError>,
}

impl ReconciliationOutcome {
    pub fn new(source_name: &str, imported_by: &str, total_rows: usize) -> Self {
        Self {
            source_name: source_name.to_string(),
            imported_by: imported_by.to_string(),
            import_date: Utc::now(),
            total_rows,
            success_count: 0,
            failure_count: 0,
            total_amount: 0.0,
            status: ImportStatus::Processing,
            errors: Vec::new(),
        }
    }

    pub fn record_success(&mut self, amount: f64) {
        self.success_count += 1;
        self.total_amount += amount;
    }

    pub fn record_failure(&mut self, row_index: usize, identifier: &str, message: String) {
        self.failure_count += 1;
        self.errors.push(RowError {
            row_index,
            identifier: identifier.to_string(),
            message,
        });
    }

    pub fn finish(&mut self) {
        self.status = if self.failure_count == 0 {
            ImportStatus::Completed
        } else {
            ImportStatus::CompletedWithErrors
        };
    }

    /// Get success rate as percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_rows == 0 {
            0.0
        } else {
            (self.success_count as f64 / self.total_rows as f64) * 100.0
        }
    }

    /// Print a formatted summary to console
    pub fn print_summary(&self, currency: &str) {
        println!("\n{}", "=== Payment Import Summary ===".cyan().bold());
        println!("Source:        {}", self.source_name);
        println!("Total Rows:    {}", self.total_rows);
        println!("Successful:    {} ✓", self.success_count.to_string().green());
        println!("Failed:        {} ✗", self.failure_count.to_string().red());
        println!("Amount:        {}", crate::utils::format_currency(self.total_amount, currency));
        println!("Success Rate:  {:.1}%", self.success_rate());

        if !self.errors.is_empty() {
            println!("\n{}", "Failed Rows:".yellow());
            crate::utils::print_table_border(90);
            crate::utils::print_table_row(&["Row", "Identifier", "Error"], &[5, 20, 60]);
            crate::utils::print_table_border(90);
            for error in &self.errors {
                crate::utils::print_table_row(
                    &[&error.row_index.to_string(), &error.identifier, &error.message],
                    &[5, 20, 60],
                );
            }
            crate::utils::print_table_border(90);
        }
    }
}

/// One payment code that could not be attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryError {
    pub payment_code: String,
    pub student_name: Option<String>,
    pub message: String,
}

/// Summary of a payment-code sync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncOutcome {
    pub total_entries: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub errors: Vec<EntryError>,
}

impl SyncOutcome {
    pub fn print_summary(&self) {
        println!("\n{}", "=== Payment Code Sync Summary ===".cyan().bold());
        println!("Total Codes:   {}", self.total_entries);
        println!("Mapped:        {} ✓", self.success_count.to_string().green());
        println!("Failed:        {} ✗", self.failure_count.to_string().red());

        for error in &self.errors {
            println!(
                "  {} {} - {}",
                error.payment_code.yellow(),
                error.student_name.as_deref().unwrap_or("-"),
                error.message
            );
        }
    }
}
