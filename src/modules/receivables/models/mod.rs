pub mod receivable;
pub mod summary;

pub use receivable::{derive_status, Receivable, ReceivableStatus};
pub use summary::{NextPayment, ReceivableSummary};
