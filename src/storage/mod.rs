pub mod db;
pub mod memory;
pub mod models;
pub mod store;

pub use db::SqliteStore;
pub use memory::MemoryStore;
pub use models::{FinancialInfo, PaymentStatus, Student, StudentId};
pub use store::StudentStore;
