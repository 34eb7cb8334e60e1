pub mod gateway_transaction_repository;

pub use gateway_transaction_repository::GatewayTransactionRepository;
