pub mod error;
pub mod money;
pub mod retry;
pub mod timezone;
pub mod traits;

pub use error::{AppError, Result};
pub use timezone::GatewayClock;
