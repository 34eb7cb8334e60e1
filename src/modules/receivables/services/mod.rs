pub mod overdue_sweep;
pub mod receivable_service;

pub use overdue_sweep::{OverdueSweep, SweepReport, DEFAULT_SWEEP_INTERVAL_SECS};
pub use receivable_service::{CreateReceivableRequest, CreatedReceivable, ReceivableService};
