// HTTP handlers for payment endpoints
//
// Endpoints:
// - POST /payments - Record a manual payment
// - GET /payments/{id} - Get a payment
// - DELETE /payments/{id} - Delete a payment and reverse it
// - POST /payments/{id}/notes - Append a note
// - GET /sales/{sale_ref}/payments - Payments of a sale

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::core::Result;
use crate::modules::payments::services::{ManualPayment, PaymentService};
use crate::modules::receivables::models::Receivable;

#[derive(Debug, Deserialize)]
pub struct AppendNoteRequest {
    pub note: String,
}

/// Response for DELETE /payments/{id}
#[derive(Debug, Serialize)]
pub struct DeletePaymentResponse {
    pub payment_id: String,
    pub deleted: bool,
    /// Receivable after the reversal; null for a sale without receivable
    pub receivable: Option<Receivable>,
}

/// POST /payments
///
/// # Returns
/// - 201: Payment, allocation and updated receivable
/// - 400: Non-positive amount, amount above outstanding, or QR method
/// - 404: Sale has no receivable
pub async fn record_payment(
    body: web::Json<ManualPayment>,
    service: web::Data<PaymentService>,
) -> Result<HttpResponse> {
    let receipt = service.record_payment(body.into_inner()).await?;

    Ok(HttpResponse::Created().json(receipt))
}

/// GET /payments/{payment_id}
pub async fn get_payment(
    payment_id: web::Path<String>,
    service: web::Data<PaymentService>,
) -> Result<HttpResponse> {
    let payment = service.get(&payment_id).await?;

    Ok(HttpResponse::Ok().json(payment))
}

/// DELETE /payments/{payment_id}
///
/// # Returns
/// - 200: Reversal applied
/// - 404: Payment not found
pub async fn delete_payment(
    payment_id: web::Path<String>,
    service: web::Data<PaymentService>,
) -> Result<HttpResponse> {
    let receivable = service.delete_payment(&payment_id).await?;

    Ok(HttpResponse::Ok().json(DeletePaymentResponse {
        payment_id: payment_id.into_inner(),
        deleted: true,
        receivable,
    }))
}

/// POST /payments/{payment_id}/notes
pub async fn append_note(
    payment_id: web::Path<String>,
    body: web::Json<AppendNoteRequest>,
    service: web::Data<PaymentService>,
) -> Result<HttpResponse> {
    let payment = service.append_note(&payment_id, &body.note).await?;

    Ok(HttpResponse::Ok().json(payment))
}

/// GET /sales/{sale_ref}/payments
pub async fn list_sale_payments(
    sale_ref: web::Path<String>,
    service: web::Data<PaymentService>,
) -> Result<HttpResponse> {
    let payments = service.list_for_sale(&sale_ref).await?;

    Ok(HttpResponse::Ok().json(payments))
}

/// Configure payment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/payments").route(web::post().to(record_payment)))
        .service(
            web::resource("/payments/{payment_id}")
                .route(web::get().to(get_payment))
                .route(web::delete().to(delete_payment)),
        )
        .service(web::resource("/payments/{payment_id}/notes").route(web::post().to(append_note)))
        .service(
            web::resource("/sales/{sale_ref}/payments").route(web::get().to(list_sale_payments)),
        );
}
