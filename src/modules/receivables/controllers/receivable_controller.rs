// HTTP handlers for receivable endpoints
//
// Endpoints:
// - POST /receivables - Open a receivable for a credit sale
// - GET /receivables/{id} - Balance summary with installments
// - GET /receivables/{id}/next-payment - Earliest open installment
// - GET /sales/{sale_ref}/receivable - Balance summary looked up by sale

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::core::Result;
use crate::modules::receivables::models::NextPayment;
use crate::modules::receivables::services::{CreateReceivableRequest, ReceivableService};

/// Response for GET /receivables/{id}/next-payment
#[derive(Debug, Serialize)]
pub struct NextPaymentResponse {
    pub receivable_id: String,
    pub next_payment: Option<NextPayment>,
}

/// POST /receivables
///
/// # Request Body
/// ```json
/// {
///   "sale_ref": "V-1024",
///   "total_amount": "300.00",
///   "due_date": "2025-06-30",
///   "schedule": { "count": 3 }
/// }
/// ```
///
/// # Returns
/// - 201: Receivable and its installments
/// - 400: Invalid total or schedule
pub async fn create_receivable(
    body: web::Json<CreateReceivableRequest>,
    service: web::Data<ReceivableService>,
) -> Result<HttpResponse> {
    let created = service.create(body.into_inner()).await?;

    Ok(HttpResponse::Created().json(created))
}

/// GET /receivables/{id}
///
/// # Returns
/// - 200: Receivable summary
/// - 404: Receivable not found
pub async fn get_receivable(
    receivable_id: web::Path<String>,
    service: web::Data<ReceivableService>,
) -> Result<HttpResponse> {
    let summary = service.summary(&receivable_id).await?;

    Ok(HttpResponse::Ok().json(summary))
}

/// GET /sales/{sale_ref}/receivable
///
/// # Returns
/// - 200: Receivable summary
/// - 404: The sale has no receivable (cash sale or unknown reference)
pub async fn get_sale_receivable(
    sale_ref: web::Path<String>,
    service: web::Data<ReceivableService>,
) -> Result<HttpResponse> {
    let receivable = service.get_by_sale(&sale_ref).await?;
    let summary = service.summary(&receivable.id).await?;

    Ok(HttpResponse::Ok().json(summary))
}

/// GET /receivables/{id}/next-payment
///
/// `next_payment` is null once the receivable is paid.
pub async fn get_next_payment(
    receivable_id: web::Path<String>,
    service: web::Data<ReceivableService>,
) -> Result<HttpResponse> {
    let next_payment = service.next_payment(&receivable_id).await?;

    Ok(HttpResponse::Ok().json(NextPaymentResponse {
        receivable_id: receivable_id.into_inner(),
        next_payment,
    }))
}

/// Configure receivable routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/receivables").route(web::post().to(create_receivable)))
        .service(web::resource("/receivables/{id}").route(web::get().to(get_receivable)))
        .service(
            web::resource("/receivables/{id}/next-payment").route(web::get().to(get_next_payment)),
        )
        .service(
            web::resource("/sales/{sale_ref}/receivable").route(web::get().to(get_sale_receivable)),
        );
}
