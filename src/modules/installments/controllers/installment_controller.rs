// HTTP handlers for installment endpoints
//
// Endpoints:
// - GET /receivables/{id}/installments - Installment schedule of a receivable
// - POST /receivables/{id}/schedule - Generate or regenerate the schedule

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::core::Result;
use crate::modules::installments::{
    models::Installment,
    services::{InstallmentService, ScheduleRequest},
};

/// Response for the installment endpoints
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    pub receivable_id: String,
    pub installments: Vec<Installment>,
}

/// GET /receivables/{receivable_id}/installments
///
/// # Returns
/// - 200: Installments ordered by sequence number
pub async fn get_installments(
    receivable_id: web::Path<String>,
    service: web::Data<InstallmentService>,
) -> Result<HttpResponse> {
    let installments = service.list(&receivable_id).await?;

    Ok(HttpResponse::Ok().json(ScheduleResponse {
        receivable_id: receivable_id.into_inner(),
        installments,
    }))
}

/// POST /receivables/{receivable_id}/schedule
///
/// # Request Body
/// ```json
/// {
///   "count": 3,
///   "first_installment_amount": "50.00",
///   "first_due": "2025-07-01"
/// }
/// ```
///
/// # Returns
/// - 201: The new schedule
/// - 400: Invalid count or custom first amount
/// - 404: Receivable not found
/// - 409: Payments were already applied
pub async fn generate_schedule(
    receivable_id: web::Path<String>,
    body: web::Json<ScheduleRequest>,
    service: web::Data<InstallmentService>,
) -> Result<HttpResponse> {
    let installments = service.generate_schedule(&receivable_id, &body).await?;

    Ok(HttpResponse::Created().json(ScheduleResponse {
        receivable_id: receivable_id.into_inner(),
        installments,
    }))
}

/// Configure installment routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/receivables/{receivable_id}/installments")
            .route(web::get().to(get_installments)),
    )
    .service(
        web::resource("/receivables/{receivable_id}/schedule")
            .route(web::post().to(generate_schedule)),
    );
}
