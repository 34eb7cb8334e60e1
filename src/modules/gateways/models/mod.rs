pub mod gateway_transaction;

pub use gateway_transaction::{GatewayTransaction, GatewayTransactionStatus};
