use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, error, info};

use super::gateway_trait::{
    CustomerInfo, OrderLine, PaymentMethodOption, QrGateway, QrGatewayRequest,
};
use crate::core::retry::ConflictRetry;
use crate::core::traits::LedgerStore;
use crate::core::{AppError, GatewayClock, Result};
use crate::modules::gateways::models::{GatewayTransaction, GatewayTransactionStatus};
use crate::modules::installments::models::Installment;
use crate::modules::reconciliation::services::{
    EventSource, GatewayEvent, ReconcileOutcome, Reconciler,
};

/// QR payment request for a sale or one of its installments
#[derive(Debug, Clone, Deserialize)]
pub struct QrRequest {
    #[serde(default)]
    pub sale_ref: String,
    pub installment_id: Option<String>,
    /// Defaults to the installment amount or the outstanding balance
    pub amount: Option<Decimal>,
    pub payment_method_id: i32,
    pub customer: CustomerInfo,
}

/// Service for issuing, polling and cancelling gateway QR payments
#[derive(Clone)]
pub struct QrPaymentService {
    store: Arc<dyn LedgerStore>,
    gateway: Arc<dyn QrGateway>,
    reconciler: Reconciler,
    clock: GatewayClock,
    retry: ConflictRetry,
}

impl QrPaymentService {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        gateway: Arc<dyn QrGateway>,
        clock: GatewayClock,
        retry: ConflictRetry,
    ) -> Self {
        Self {
            reconciler: Reconciler::new(store.clone(), clock, retry),
            store,
            gateway,
            clock,
            retry,
        }
    }

    /// Issue a QR and persist the pending gateway transaction
    ///
    /// # Business Rules
    /// - The amount must be positive and within the outstanding balance
    /// - A paid installment cannot be charged again
    /// - A sale without receivable needs an explicit amount
    /// - The gateway is called before anything is written; on failure nothing is stored
    pub async fn request_qr(&self, request: QrRequest) -> Result<GatewayTransaction> {
        let sale_ref = request.sale_ref.trim().to_string();
        if sale_ref.is_empty() {
            return Err(AppError::validation("Sale reference cannot be empty"));
        }

        let receivable = self.store.find_receivable_by_sale(&sale_ref).await?;

        let installment: Option<Installment> = match (&request.installment_id, &receivable) {
            (Some(installment_id), Some(receivable)) => {
                let installment = self
                    .store
                    .list_installments(&receivable.id)
                    .await?
                    .into_iter()
                    .find(|i| &i.id == installment_id)
                    .ok_or_else(|| {
                        AppError::not_found(format!("Installment {} not found", installment_id))
                    })?;

                if !installment.is_open() {
                    return Err(AppError::validation(format!(
                        "Installment #{} is already paid",
                        installment.sequence_number
                    )));
                }
                Some(installment)
            }
            (Some(_), None) => {
                return Err(AppError::validation(format!(
                    "Sale {} has no installments",
                    sale_ref
                )));
            }
            (None, _) => None,
        };

        let amount = match &receivable {
            Some(receivable) => {
                let amount = request
                    .amount
                    .or_else(|| installment.as_ref().map(|i| i.amount))
                    .unwrap_or(receivable.outstanding_amount);
                receivable.check_payment_amount(amount)?;
                amount
            }
            None => {
                let amount = request.amount.ok_or_else(|| {
                    AppError::invalid_amount("Amount is required for a sale without receivable")
                })?;
                if amount <= Decimal::ZERO {
                    return Err(AppError::invalid_amount("Payment amount must be positive"));
                }
                amount
            }
        };

        let now = Utc::now();
        let (internal_id, product) = match &installment {
            Some(installment) => (
                GatewayTransaction::installment_transaction_id(&installment.id, now),
                format!("Cuota #{} - Venta {}", installment.sequence_number, sale_ref),
            ),
            None => (
                GatewayTransaction::sale_transaction_id(&sale_ref, now),
                format!("Venta {}", sale_ref),
            ),
        };

        let gateway_request = QrGatewayRequest {
            internal_transaction_id: internal_id.clone(),
            amount,
            payment_method_id: request.payment_method_id,
            customer: request.customer.clone(),
            order_lines: vec![OrderLine {
                product,
                quantity: 1,
                price: amount,
            }],
        };

        let response = self.gateway.request_qr(gateway_request).await.map_err(|e| {
            error!(
                sale_ref = sale_ref.as_str(),
                internal_transaction_id = internal_id.as_str(),
                gateway = self.gateway.name(),
                error = %e,
                "QR generation failed"
            );
            match e {
                AppError::ExternalGateway(_) => e,
                other => AppError::gateway(other.to_string()),
            }
        })?;

        let mut transaction = GatewayTransaction::new_pending(
            sale_ref.clone(),
            installment.as_ref().map(|i| i.id.clone()),
            internal_id,
            amount,
            Some(request.payment_method_id),
        );
        transaction.external_transaction_id = response.external_transaction_id.clone();
        transaction.qr_image = response.qr_image.clone();
        transaction.checkout_url = response.checkout_url.clone();
        transaction.expiration_date = response.expiration_date;
        transaction.record_event("qr_request", response.raw.clone());

        self.retry
            .run("store_gateway_transaction", || async {
                let mut tx = self.store.begin().await?;
                tx.insert_gateway_transaction(&transaction).await?;
                tx.commit().await
            })
            .await?;

        info!(
            transaction_id = transaction.id.as_str(),
            sale_ref = sale_ref.as_str(),
            internal_transaction_id = transaction.internal_transaction_id.as_str(),
            amount = %amount,
            "QR payment issued"
        );

        Ok(transaction)
    }

    /// Poll the gateway and reconcile whatever it reports
    pub async fn check_status(&self, transaction_id: &str) -> Result<ReconcileOutcome> {
        let transaction = self
            .store
            .find_gateway_transaction(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Gateway transaction {} not found", transaction_id))
            })?;

        let report = self
            .gateway
            .query_status(&transaction.internal_transaction_id)
            .await?;

        let event = GatewayEvent {
            lookup_key: transaction.internal_transaction_id.clone(),
            status: GatewayTransactionStatus::from_gateway_code(report.payment_status),
            occurred_at: self.clock.parse_fecha_hora(
                report.payment_date.as_deref(),
                report.payment_time.as_deref(),
            ),
            method_name: None,
            source: EventSource::Poll,
            raw: report.raw,
        };

        self.reconciler.reconcile(event).await
    }

    /// Cancel a pending QR
    pub async fn cancel(&self, transaction_id: &str) -> Result<GatewayTransaction> {
        let transaction = self
            .retry
            .run("cancel_gateway_transaction", || async {
                let mut tx = self.store.begin().await?;

                let mut transaction = tx
                    .gateway_transaction_for_update(transaction_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::not_found(format!("Gateway transaction {} not found", transaction_id))
                    })?;

                if !transaction.transition_to(GatewayTransactionStatus::Cancelled) {
                    return Err(AppError::validation(format!(
                        "Gateway transaction is already {}",
                        transaction.status
                    )));
                }
                transaction.record_event("cancel", serde_json::json!({ "status": "cancelled" }));

                tx.update_gateway_transaction(&transaction).await?;
                tx.commit().await?;

                Ok(transaction)
            })
            .await?;

        info!(
            transaction_id = transaction.id.as_str(),
            sale_ref = transaction.sale_ref.as_str(),
            "QR payment cancelled"
        );

        Ok(transaction)
    }

    /// Payment methods the gateway currently accepts
    pub async fn list_payment_methods(&self) -> Result<Vec<PaymentMethodOption>> {
        let methods = self.gateway.list_payment_methods().await.map_err(|e| {
            error!(gateway = self.gateway.name(), error = %e, "Payment method listing failed");
            match e {
                AppError::ExternalGateway(_) => e,
                other => AppError::gateway(other.to_string()),
            }
        })?;

        debug!(count = methods.len(), "Listed gateway payment methods");

        Ok(methods)
    }

    pub async fn get(&self, transaction_id: &str) -> Result<GatewayTransaction> {
        self.store
            .find_gateway_transaction(transaction_id)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Gateway transaction {} not found", transaction_id))
            })
    }
}
