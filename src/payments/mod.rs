pub mod normalize;
pub mod resolver;
pub mod import;
pub mod outcome;
pub mod analytics;
pub mod reconciler;

pub use normalize::{FeeCategory, PaymentMethod, TransactionStatus};
pub use resolver::{ResolutionStrategy, StudentKeys, StudentResolver};
pub use import::{ImportedRow, PaymentCodeEntry, TransactionRow};
pub use outcome::{ReconciliationOutcome, RowError, SyncOutcome};
pub use analytics::{compute_analytics, PaymentAnalytics};
pub use reconciler::{ManualPayment, PaymentReconciler, PortalContext};
