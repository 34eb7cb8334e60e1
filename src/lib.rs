//! Cobranza credit receivables service
//!
//! Installment schedules, payment allocation and PagoFácil QR reconciliation
//! over a MySQL ledger.

pub mod config;
pub mod core;
pub mod modules;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use actix_web::web;

use crate::core::retry::ConflictRetry;
use crate::core::traits::LedgerStore;
use crate::core::{AppError, GatewayClock};
use crate::modules::gateways::services::{QrGateway, QrPaymentService};
use crate::modules::installments::services::InstallmentService;
use crate::modules::payments::services::PaymentService;
use crate::modules::receivables::services::{OverdueSweep, ReceivableService};
use crate::modules::reconciliation::controllers::WebhookController;
use crate::modules::reconciliation::services::Reconciler;

// Re-export commonly used types
pub use modules::gateways;
pub use modules::installments;
pub use modules::payments;
pub use modules::receivables;
pub use modules::reconciliation;

/// Services shared by every HTTP worker
#[derive(Clone)]
pub struct AppServices {
    pub store: web::Data<dyn LedgerStore>,
    pub receivables: web::Data<ReceivableService>,
    pub installments: web::Data<InstallmentService>,
    pub payments: web::Data<PaymentService>,
    pub qr: web::Data<QrPaymentService>,
    pub webhook: web::Data<WebhookController>,
    clock: GatewayClock,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn QrGateway>,
        clock: GatewayClock,
        retry: ConflictRetry,
    ) -> Self {
        let reconciler = Reconciler::new(store.clone(), clock, retry);

        Self {
            receivables: web::Data::new(ReceivableService::new(store.clone(), clock, retry)),
            installments: web::Data::new(InstallmentService::new(store.clone(), clock, retry)),
            payments: web::Data::new(PaymentService::new(store.clone(), clock, retry)),
            qr: web::Data::new(QrPaymentService::new(store.clone(), gateway, clock, retry)),
            webhook: web::Data::new(WebhookController::new(reconciler, clock)),
            store: web::Data::from(store),
            clock,
        }
    }

    /// Background sweep over the same store
    pub fn overdue_sweep(&self, period: Duration) -> OverdueSweep {
        OverdueSweep::new(self.store.clone().into_inner(), self.clock, period)
    }
}

/// Register shared state and every route on an application
pub fn configure(cfg: &mut web::ServiceConfig, services: &AppServices) {
    cfg.app_data(services.store.clone())
        .app_data(services.receivables.clone())
        .app_data(services.installments.clone())
        .app_data(services.payments.clone())
        .app_data(services.qr.clone())
        .app_data(services.webhook.clone())
        .app_data(web::JsonConfig::default().error_handler(|err, _req| {
            AppError::validation(err.to_string()).into()
        }))
        .configure(modules::health::configure)
        .service(
            web::scope("/api")
                .configure(modules::receivables::configure)
                .configure(modules::installments::configure)
                .configure(modules::payments::configure)
                .configure(modules::gateways::configure)
                .configure(modules::reconciliation::configure),
        );
}
