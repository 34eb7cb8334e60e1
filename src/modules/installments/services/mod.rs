pub mod allocator;
pub mod installment_service;
pub mod scheduler;

pub use allocator::{apply_payment, apply_payment_to_installment, AllocationLine, AllocationResult};
pub use installment_service::{InstallmentService, ScheduleRequest};
pub use scheduler::{build_schedule, ScheduleLine, SpacingPolicy, MAX_INSTALLMENTS};
