pub mod installment;

pub use installment::{open_balance, open_in_payment_order, Installment, InstallmentStatus};
