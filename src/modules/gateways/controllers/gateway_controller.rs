// HTTP handlers for QR gateway transactions
//
// Endpoints:
// - POST /sales/{sale_ref}/qr - Issue a QR for a sale or installment
// - GET /gateway-transactions/{id} - Get a gateway transaction
// - POST /gateway-transactions/{id}/check - Poll the gateway and reconcile
// - POST /gateway-transactions/{id}/cancel - Cancel a pending QR
// - GET /payment-methods - Payment methods enabled at the gateway

use actix_web::{web, HttpResponse};

use crate::core::Result;
use crate::modules::gateways::services::{QrPaymentService, QrRequest};

/// POST /sales/{sale_ref}/qr
///
/// # Request Body
/// ```json
/// {
///   "installment_id": "0f6c...",
///   "payment_method_id": 4,
///   "customer": { "name": "Ana Rojas", "document_id": "1234567" }
/// }
/// ```
///
/// # Returns
/// - 201: Pending gateway transaction with QR image
/// - 400: Invalid amount or installment already paid
/// - 502: Gateway rejected the request
pub async fn request_qr(
    sale_ref: web::Path<String>,
    body: web::Json<QrRequest>,
    service: web::Data<QrPaymentService>,
) -> Result<HttpResponse> {
    let mut request = body.into_inner();
    request.sale_ref = sale_ref.into_inner();

    let transaction = service.request_qr(request).await?;

    Ok(HttpResponse::Created().json(transaction))
}

/// GET /gateway-transactions/{transaction_id}
pub async fn get_transaction(
    transaction_id: web::Path<String>,
    service: web::Data<QrPaymentService>,
) -> Result<HttpResponse> {
    let transaction = service.get(&transaction_id).await?;

    Ok(HttpResponse::Ok().json(transaction))
}

/// POST /gateway-transactions/{transaction_id}/check
///
/// # Returns
/// - 200: Reconcile outcome
/// - 404: Unknown transaction
pub async fn check_status(
    transaction_id: web::Path<String>,
    service: web::Data<QrPaymentService>,
) -> Result<HttpResponse> {
    let outcome = service.check_status(&transaction_id).await?;

    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /gateway-transactions/{transaction_id}/cancel
///
/// # Returns
/// - 200: Cancelled transaction
/// - 400: Transaction is no longer pending
pub async fn cancel_transaction(
    transaction_id: web::Path<String>,
    service: web::Data<QrPaymentService>,
) -> Result<HttpResponse> {
    let transaction = service.cancel(&transaction_id).await?;

    Ok(HttpResponse::Ok().json(transaction))
}

/// GET /payment-methods
///
/// # Returns
/// - 200: Enabled methods; pass `payment_method_id` on QR requests
/// - 502: Gateway unavailable
pub async fn list_payment_methods(service: web::Data<QrPaymentService>) -> Result<HttpResponse> {
    let methods = service.list_payment_methods().await?;

    Ok(HttpResponse::Ok().json(methods))
}

/// Configure gateway routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/sales/{sale_ref}/qr").route(web::post().to(request_qr)))
        .service(web::resource("/payment-methods").route(web::get().to(list_payment_methods)))
        .service(
            web::resource("/gateway-transactions/{transaction_id}")
                .route(web::get().to(get_transaction)),
        )
        .service(
            web::resource("/gateway-transactions/{transaction_id}/check")
                .route(web::post().to(check_status)),
        )
        .service(
            web::resource("/gateway-transactions/{transaction_id}/cancel")
                .route(web::post().to(cancel_transaction)),
        );
}
