pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::configure;
pub use models::{Installment, InstallmentStatus};
pub use repositories::InstallmentRepository;
pub use services::{InstallmentService, ScheduleRequest};
