pub mod receivable_controller;

pub use receivable_controller::{configure, create_receivable, get_next_payment, get_receivable};
