pub mod payment_service;
pub(crate) mod posting;

pub use payment_service::{ManualPayment, PaymentReceipt, PaymentService};
pub use posting::PostingOutcome;
