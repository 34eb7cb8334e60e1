pub mod installment_controller;

pub use installment_controller::{configure, generate_schedule, get_installments};
