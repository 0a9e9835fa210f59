use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalError {
    #[error("Student not found: {0}")]
    StudentNotFound(String),

    #[error("Payment code {0} not found. Please sync payment codes first.")]
    PaymentCodeNotFound(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Persistence failure: {0}")]
    Persistence(String),

    #[error("Failed to save import record: {0}")]
    BatchRecord(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PortalError>;

/// A stored value that does not name any known variant.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("unknown {kind}: {value:?}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownVariant {
    pub fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}
