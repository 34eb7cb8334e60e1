pub mod payment_controller;

pub use payment_controller::{append_note, configure, delete_payment, get_payment, record_payment};
