pub mod payment;

pub use payment::{default_reference, Payment, PaymentAllocation, PaymentMethod};
