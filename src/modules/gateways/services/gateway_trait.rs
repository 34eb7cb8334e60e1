use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::Result;

/// QR payment gateway client
#[async_trait]
pub trait QrGateway: Send + Sync {
    /// Ask the gateway for a payment QR
    async fn request_qr(&self, request: QrGatewayRequest) -> Result<QrGatewayResponse>;

    /// Query the payment status of a transaction by its internal id
    async fn query_status(&self, internal_transaction_id: &str) -> Result<GatewayStatusReport>;

    /// Payment methods enabled for this merchant; their ids feed `payment_method_id`
    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethodOption>>;

    /// Get gateway name
    fn name(&self) -> &str;
}

/// Customer identity sent with a QR request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub document_id: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub client_code: Option<String>,
}

/// A single order line shown on the gateway checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product: String,
    pub quantity: u32,
    pub price: Decimal,
}

/// QR request data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrGatewayRequest {
    /// Our transaction id, echoed back by the gateway as `PedidoID`
    pub internal_transaction_id: String,
    pub amount: Decimal,
    pub payment_method_id: i32,
    pub customer: CustomerInfo,
    pub order_lines: Vec<OrderLine>,
}

/// QR response from gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QrGatewayResponse {
    pub external_transaction_id: Option<String>,
    /// Base64 encoded image
    pub qr_image: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub checkout_url: Option<String>,
    /// Full gateway response (JSON)
    pub raw: serde_json::Value,
}

/// Status report from the gateway's query endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatusReport {
    /// 1 pending, 2 completed, 3 expired, 4 failed
    pub payment_status: i32,
    /// Gateway-local date, YYYY-MM-DD
    pub payment_date: Option<String>,
    /// Gateway-local time, HH:MM:SS
    pub payment_time: Option<String>,
    pub raw: serde_json::Value,
}

/// A payment method the merchant may offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethodOption {
    pub payment_method_id: i32,
    pub name: String,
    pub currency: Option<String>,
    pub max_amount_per_day: Option<Decimal>,
    pub max_amount_per_transaction: Option<Decimal>,
}
