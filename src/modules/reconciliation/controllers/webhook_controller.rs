use actix_web::{http::StatusCode, web, HttpResponse};
use tracing::{error, info, warn};

use crate::core::{AppError, GatewayClock};
use crate::modules::reconciliation::models::{AckEnvelope, WebhookPayload};
use crate::modules::reconciliation::services::Reconciler;

/// Webhook controller for PagoFácil payment notifications
///
/// Always answers with the gateway's fixed acknowledgment envelope, never
/// with the internal error body.
pub struct WebhookController {
    reconciler: Reconciler,
    clock: GatewayClock,
}

impl WebhookController {
    /// Create a new WebhookController
    ///
    /// # Arguments
    /// * `reconciler` - Applies the notification to the ledger
    /// * `clock` - Converts the gateway's local `Fecha`/`Hora` to UTC
    pub fn new(reconciler: Reconciler, clock: GatewayClock) -> Self {
        Self { reconciler, clock }
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }
}

/// Process a PagoFácil notification
///
/// POST /pagofacil/webhook
///
/// # Request Body
/// ```json
/// {
///   "PedidoID": "V-1024-1741640000",
///   "Fecha": "2025-03-10",
///   "Hora": "14:32:10",
///   "MetodoPago": "QR",
///   "Estado": "Completado"
/// }
/// ```
///
/// # Returns
/// * `200 OK` - Processed, or already processed
/// * `400 Bad Request` - Malformed payload
/// * `404 Not Found` - Unknown `PedidoID`
/// * `500 Internal Server Error` - Processing failed; the gateway may redeliver
pub async fn pagofacil_webhook(
    body: web::Bytes,
    controller: web::Data<WebhookController>,
) -> HttpResponse {
    let (payload, raw) = match WebhookPayload::parse(&body) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(
                error = %e,
                body = %String::from_utf8_lossy(&body),
                "Rejected malformed PagoFácil notification"
            );
            return ack(StatusCode::BAD_REQUEST, AckEnvelope::invalid_payload());
        }
    };

    info!(
        pedido_id = payload.pedido_id.as_str(),
        estado = payload.estado.as_str(),
        "Received PagoFácil notification"
    );

    let event = payload.into_event(&controller.clock, raw);

    match controller.reconciler.reconcile(event).await {
        Ok(outcome) if outcome.already_processed => {
            ack(StatusCode::OK, AckEnvelope::already_processed())
        }
        Ok(_) => ack(StatusCode::OK, AckEnvelope::processed()),
        Err(AppError::NotFound(_)) => ack(StatusCode::NOT_FOUND, AckEnvelope::not_found()),
        Err(e) => {
            error!(error = %e, "PagoFácil notification failed");
            ack(StatusCode::INTERNAL_SERVER_ERROR, AckEnvelope::failed())
        }
    }
}

fn ack(status: StatusCode, envelope: AckEnvelope) -> HttpResponse {
    HttpResponse::build(status).json(envelope)
}

/// Configure webhook routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/pagofacil/webhook").route(web::post().to(pagofacil_webhook)));
}
