pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::configure;
pub use models::{NextPayment, Receivable, ReceivableStatus, ReceivableSummary};
pub use repositories::ReceivableRepository;
pub use services::{OverdueSweep, ReceivableService, SweepReport};
