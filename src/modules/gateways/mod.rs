pub mod controllers;
pub mod models;
pub mod repositories;
pub mod services;

pub use controllers::configure;
pub use models::{GatewayTransaction, GatewayTransactionStatus};
pub use repositories::GatewayTransactionRepository;
pub use services::{PagoFacilClient, QrGateway, QrPaymentService, QrRequest};
