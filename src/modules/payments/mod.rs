pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::configure;
pub use models::{Payment, PaymentAllocation, PaymentMethod};
pub use repositories::PaymentRepository;
pub use services::{ManualPayment, PaymentReceipt, PaymentService};
