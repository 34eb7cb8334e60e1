use serde::{Deserialize, Serialize};

use crate::core::{AppError, GatewayClock, Result};
use crate::modules::gateways::models::GatewayTransactionStatus;
use crate::modules::reconciliation::services::reconciler::{EventSource, GatewayEvent};

pub const MSG_PROCESSED: &str = "Notificación procesada correctamente";
pub const MSG_ALREADY_PROCESSED: &str = "Transacción ya procesada";
pub const MSG_NOT_FOUND: &str = "Transacción no encontrada";
pub const MSG_INVALID_PAYLOAD: &str = "Payload inválido";
pub const MSG_FAILED: &str = "Error procesando notificación";

/// Payment notification posted by PagoFácil
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Our internal transaction id
    #[serde(rename = "PedidoID")]
    pub pedido_id: String,
    /// Gateway-local date, YYYY-MM-DD
    #[serde(rename = "Fecha")]
    pub fecha: String,
    /// Gateway-local time, HH:MM:SS
    #[serde(rename = "Hora")]
    pub hora: String,
    #[serde(rename = "MetodoPago")]
    pub metodo_pago: String,
    #[serde(rename = "Estado")]
    pub estado: String,
}

impl WebhookPayload {
    /// Parse a raw request body, returning the payload and the body as JSON
    pub fn parse(body: &[u8]) -> Result<(Self, serde_json::Value)> {
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| AppError::validation(format!("Webhook body is not JSON: {}", e)))?;

        let payload: WebhookPayload = serde_json::from_value(raw.clone())
            .map_err(|e| AppError::validation(format!("Invalid webhook payload: {}", e)))?;

        if payload.pedido_id.trim().is_empty() {
            return Err(AppError::validation("PedidoID cannot be empty"));
        }

        Ok((payload, raw))
    }

    pub fn into_event(self, clock: &GatewayClock, raw: serde_json::Value) -> GatewayEvent {
        let method_name = Some(self.metodo_pago.trim().to_string()).filter(|m| !m.is_empty());

        GatewayEvent {
            lookup_key: self.pedido_id.trim().to_string(),
            status: GatewayTransactionStatus::from_webhook_text(&self.estado),
            occurred_at: clock.parse_fecha_hora(Some(&self.fecha), Some(&self.hora)),
            method_name,
            source: EventSource::Webhook,
            raw,
        }
    }
}

/// Fixed acknowledgment body returned to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEnvelope {
    pub error: i32,
    pub status: i32,
    pub message: String,
    pub values: bool,
}

impl AckEnvelope {
    fn success(message: &str) -> Self {
        Self {
            error: 0,
            status: 1,
            message: message.to_string(),
            values: true,
        }
    }

    fn failure(message: &str) -> Self {
        Self {
            error: 1,
            status: 0,
            message: message.to_string(),
            values: false,
        }
    }

    pub fn processed() -> Self {
        Self::success(MSG_PROCESSED)
    }

    pub fn already_processed() -> Self {
        Self::success(MSG_ALREADY_PROCESSED)
    }

    pub fn not_found() -> Self {
        Self::failure(MSG_NOT_FOUND)
    }

    pub fn invalid_payload() -> Self {
        Self::failure(MSG_INVALID_PAYLOAD)
    }

    pub fn failed() -> Self {
        Self::failure(MSG_FAILED)
    }
}
