pub mod gateway_trait;
pub mod pagofacil;
pub mod qr_service;

pub use gateway_trait::{
    CustomerInfo, GatewayStatusReport, OrderLine, PaymentMethodOption, QrGateway,
    QrGatewayRequest, QrGatewayResponse,
};
pub use pagofacil::PagoFacilClient;
pub use qr_service::{QrPaymentService, QrRequest};
