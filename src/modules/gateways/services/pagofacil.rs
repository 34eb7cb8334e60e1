use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::RetryTransientMiddleware;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::gateway_trait::{
    GatewayStatusReport, PaymentMethodOption, QrGateway, QrGatewayRequest, QrGatewayResponse,
};
use crate::config::PagoFacilConfig;
use crate::core::{AppError, GatewayClock, Result};

const DEFAULT_TOKEN_MINUTES: i64 = 720;
const TOKEN_REFRESH_MARGIN_MINUTES: i64 = 10;
const STATUS_QUERY_RETRIES: u32 = 3;

/// Every PagoFácil response is wrapped in this envelope; `error != 0` means failure
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    error: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    values: Value,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderDetail {
    serial: u32,
    product: String,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    price: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    discount: Decimal,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    total: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateQrBody {
    payment_method: i32,
    client_name: String,
    document_type: i32,
    document_id: String,
    phone_number: String,
    email: String,
    payment_number: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    amount: Decimal,
    currency: i32,
    client_code: String,
    callback_url: String,
    order_detail: Vec<OrderDetail>,
}

/// PagoFácil QR gateway client
///
/// Authenticates against `/login` and keeps the bearer token until ten minutes
/// before it expires. QR generation is never retried; the status query and
/// the method listing are.
pub struct PagoFacilClient {
    client: Client,
    query_client: ClientWithMiddleware,
    config: PagoFacilConfig,
    clock: GatewayClock,
    token: RwLock<Option<CachedToken>>,
}

impl PagoFacilClient {
    pub fn new(config: PagoFacilConfig, clock: GatewayClock) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        let retry_policy =
            ExponentialBackoff::builder().build_with_max_retries(STATUS_QUERY_RETRIES);
        let query_client = ClientBuilder::new(client.clone())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self {
            client,
            query_client,
            config,
            clock,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Bearer token, logging in again when the cached one is close to expiry
    async fn access_token(&self) -> Result<String> {
        let now = Utc::now();

        if let Some(token) = self.token.read().await.as_ref() {
            if now < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let mut guard = self.token.write().await;
        if let Some(token) = guard.as_ref() {
            if now < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.login().await?;
        let value = token.value.clone();
        *guard = Some(token);

        Ok(value)
    }

    async fn login(&self) -> Result<CachedToken> {
        let response = self
            .client
            .post(self.url("login"))
            .header("tcTokenService", &self.config.token_service)
            .header("tcTokenSecret", &self.config.token_secret)
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("PagoFácil login failed: {}", e)))?;

        let values = read_envelope(response.status(), response.text().await).map_err(|e| {
            AppError::gateway(format!("PagoFácil login rejected: {}", e))
        })?;

        let value = values
            .get("accessToken")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::gateway("PagoFácil login returned no access token"))?
            .to_string();

        let minutes = values
            .get("expiresInMinutes")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_TOKEN_MINUTES);

        debug!(expires_in_minutes = minutes, "PagoFácil token refreshed");

        Ok(CachedToken {
            value,
            refresh_at: Utc::now()
                + chrono::Duration::minutes((minutes - TOKEN_REFRESH_MARGIN_MINUTES).max(0)),
        })
    }

    fn generate_qr_body(&self, request: &QrGatewayRequest) -> GenerateQrBody {
        let order_detail = request
            .order_lines
            .iter()
            .enumerate()
            .map(|(index, line)| OrderDetail {
                serial: index as u32 + 1,
                product: line.product.clone(),
                quantity: line.quantity,
                price: line.price,
                discount: Decimal::ZERO,
                total: line.price * Decimal::from(line.quantity),
            })
            .collect();

        let customer = &request.customer;

        GenerateQrBody {
            payment_method: request.payment_method_id,
            client_name: customer.name.clone(),
            document_type: self.config.document_type,
            document_id: customer.document_id.clone(),
            phone_number: customer.phone_number.clone().unwrap_or_default(),
            email: customer.email.clone().unwrap_or_default(),
            payment_number: request.internal_transaction_id.clone(),
            amount: request.amount,
            currency: self.config.currency,
            client_code: customer
                .client_code
                .clone()
                .unwrap_or_else(|| customer.document_id.clone()),
            callback_url: self.config.callback_url.clone(),
            order_detail,
        }
    }

    /// The gateway sends expiration either as RFC 3339 or as local `YYYY-MM-DD HH:MM:SS`
    fn parse_expiration(&self, raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw.trim(), "%Y-%m-%d %H:%M:%S")
            .ok()
            .and_then(|local| self.clock.local_to_utc(local))
    }
}

#[async_trait]
impl QrGateway for PagoFacilClient {
    async fn request_qr(&self, request: QrGatewayRequest) -> Result<QrGatewayResponse> {
        let token = self.access_token().await?;
        let body = self.generate_qr_body(&request);

        let response = self
            .client
            .post(self.url("generate-qr"))
            .bearer_auth(&token)
            .header("Response-Language", &self.config.language)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("PagoFácil QR request failed: {}", e)))?;

        let values = read_envelope(response.status(), response.text().await).map_err(|e| {
            warn!(
                internal_transaction_id = request.internal_transaction_id.as_str(),
                error = %e,
                "PagoFácil rejected QR request"
            );
            AppError::gateway(format!("PagoFácil QR request rejected: {}", e))
        })?;

        let text = |key: &str| values.get(key).and_then(Value::as_str).map(str::to_string);

        Ok(QrGatewayResponse {
            external_transaction_id: values
                .get("transactionId")
                .and_then(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                }),
            qr_image: text("qrBase64"),
            expiration_date: text("expirationDate").and_then(|raw| self.parse_expiration(&raw)),
            checkout_url: text("checkoutUrl"),
            raw: values,
        })
    }

    async fn query_status(&self, internal_transaction_id: &str) -> Result<GatewayStatusReport> {
        let token = self.access_token().await?;

        let response = self
            .query_client
            .post(self.url("query-transaction"))
            .bearer_auth(&token)
            .header("Response-Language", &self.config.language)
            .json(&serde_json::json!({ "companyTransactionId": internal_transaction_id }))
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("PagoFácil status query failed: {}", e)))?;

        let values = read_envelope(response.status(), response.text().await)
            .map_err(|e| AppError::gateway(format!("PagoFácil status query rejected: {}", e)))?;

        Ok(status_report(values))
    }

    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethodOption>> {
        let token = self.access_token().await?;

        let response = self
            .query_client
            .post(self.url("list-enabled-services"))
            .bearer_auth(&token)
            .header("Response-Language", &self.config.language)
            .send()
            .await
            .map_err(|e| AppError::gateway(format!("PagoFácil method listing failed: {}", e)))?;

        let values = read_envelope(response.status(), response.text().await)
            .map_err(|e| AppError::gateway(format!("PagoFácil method listing rejected: {}", e)))?;

        Ok(payment_methods(&values))
    }

    fn name(&self) -> &str {
        "pagofacil"
    }
}

/// Unwrap the gateway envelope, returning its `values`
fn read_envelope(
    status: reqwest::StatusCode,
    body: std::result::Result<String, reqwest::Error>,
) -> std::result::Result<Value, String> {
    let body = body.map_err(|e| e.to_string())?;

    if !status.is_success() {
        return Err(format!("HTTP {}: {}", status, body));
    }

    let envelope: Envelope =
        serde_json::from_str(&body).map_err(|e| format!("Invalid response: {}", e))?;

    if envelope.error != 0 {
        return Err(envelope
            .message
            .unwrap_or_else(|| format!("error code {}", envelope.error)));
    }

    Ok(envelope.values)
}

/// Numbers arrive either as JSON numbers or as text
fn lenient_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn lenient_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => n.to_string().parse().ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Entries without a usable id are skipped
fn payment_methods(values: &Value) -> Vec<PaymentMethodOption> {
    let Some(entries) = values.as_array() else {
        warn!("PagoFácil method listing returned no array");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = lenient_i64(entry.get("paymentMethodId"))?;
            Some(PaymentMethodOption {
                payment_method_id: i32::try_from(id).ok()?,
                name: entry
                    .get("paymentMethodName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                currency: entry
                    .get("currencyName")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                max_amount_per_day: lenient_decimal(entry.get("maxAmountPerDay")),
                max_amount_per_transaction: lenient_decimal(entry.get("maxAmountPerTransaction")),
            })
        })
        .collect()
}

fn status_report(values: Value) -> GatewayStatusReport {
    let payment_status = lenient_i64(values.get("paymentStatus"))
        .and_then(|code| i32::try_from(code).ok())
        .unwrap_or(0);

    let text = |key: &str| {
        values
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    GatewayStatusReport {
        payment_status,
        payment_date: text("paymentDate"),
        payment_time: text("paymentTime"),
        raw: values,
    }
}
