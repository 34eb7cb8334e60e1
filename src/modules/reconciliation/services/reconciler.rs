// Gateway transaction reconciliation
//
// Webhook notifications and status polls both land here. Each event is applied
// in one unit of work with the transaction row locked; a completed event turns
// into exactly one Payment posted against the sale's receivable.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::core::retry::ConflictRetry;
use crate::core::traits::LedgerStore;
use crate::core::{AppError, GatewayClock, Result};
use crate::modules::gateways::models::{GatewayTransaction, GatewayTransactionStatus};
use crate::modules::payments::models::{Payment, PaymentMethod};
use crate::modules::payments::services::posting::post_payment;

/// `recorded_by` for payments created from gateway events
pub const GATEWAY_RECORDER: &str = "gateway";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    Webhook,
    Poll,
}

impl EventSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Poll => "poll",
        }
    }
}

/// A status report about one gateway transaction
#[derive(Debug, Clone)]
pub struct GatewayEvent {
    /// Internal or external transaction id
    pub lookup_key: String,
    pub status: GatewayTransactionStatus,
    /// When the gateway says the payment happened
    pub occurred_at: Option<DateTime<Utc>>,
    pub method_name: Option<String>,
    pub source: EventSource,
    pub raw: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileOutcome {
    pub transaction_id: String,
    /// The transaction was already completed; nothing was changed
    pub already_processed: bool,
    pub status: GatewayTransactionStatus,
    /// Payment created by this event
    pub payment: Option<Payment>,
}

/// Applies gateway events to gateway transactions and the receivable ledger
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn LedgerStore>,
    clock: GatewayClock,
    retry: ConflictRetry,
}

impl Reconciler {
    pub fn new(store: Arc<dyn LedgerStore>, clock: GatewayClock, retry: ConflictRetry) -> Self {
        Self { store, clock, retry }
    }

    /// Apply one gateway event
    ///
    /// # Business Rules
    /// - The completed check happens after the transaction row is locked
    /// - Every event is appended to the transaction's audit payload
    /// - Only `pending` transactions change status
    /// - A completed event creates one `qr` Payment, linked through `payment_id`
    /// - On failure nothing is applied; the error is recorded separately so a
    ///   redelivery can try again
    pub async fn reconcile(&self, event: GatewayEvent) -> Result<ReconcileOutcome> {
        match self
            .retry
            .run("reconcile", || self.reconcile_once(&event))
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(err @ AppError::NotFound(_)) => {
                warn!(
                    lookup_key = event.lookup_key.as_str(),
                    source = event.source.as_str(),
                    "Gateway event for unknown transaction"
                );
                Err(err)
            }
            Err(err) => {
                error!(
                    lookup_key = event.lookup_key.as_str(),
                    source = event.source.as_str(),
                    status = event.status.as_str(),
                    payload = %event.raw,
                    error = %err,
                    "Gateway event could not be applied"
                );

                if let Err(audit_err) = self.record_failure(&event, &err).await {
                    error!(
                        lookup_key = event.lookup_key.as_str(),
                        error = %audit_err,
                        "Failed to record gateway event failure"
                    );
                }

                Err(err)
            }
        }
    }

    async fn reconcile_once(&self, event: &GatewayEvent) -> Result<ReconcileOutcome> {
        let today = self.clock.today(Utc::now());
        let mut tx = self.store.begin().await?;

        let mut transaction = tx
            .gateway_transaction_for_update(&event.lookup_key)
            .await?
            .ok_or_else(|| {
                AppError::not_found(format!("Gateway transaction {} not found", event.lookup_key))
            })?;

        if transaction.is_completed() {
            info!(
                transaction_id = transaction.id.as_str(),
                source = event.source.as_str(),
                "Gateway transaction already processed"
            );
            return Ok(ReconcileOutcome {
                transaction_id: transaction.id,
                already_processed: true,
                status: GatewayTransactionStatus::Completed,
                payment: None,
            });
        }

        transaction.record_event(event.source.as_str(), event.raw.clone());

        let previous = transaction.status;
        if !transaction.transition_to(event.status) {
            // Still pending, or an event for a finished transaction: audit only
            tx.update_gateway_transaction(&transaction).await?;
            tx.commit().await?;

            return Ok(ReconcileOutcome {
                transaction_id: transaction.id,
                already_processed: false,
                status: transaction.status,
                payment: None,
            });
        }

        if let Some(name) = &event.method_name {
            transaction.payment_method_name = Some(name.clone());
        }

        let payment = if transaction.is_completed() {
            let payment = link_gateway_payment(&mut transaction, event)?;
            post_payment(
                tx.as_mut(),
                &payment,
                transaction.installment_id.as_deref(),
                today,
            )
            .await?;
            Some(payment)
        } else {
            None
        };

        tx.update_gateway_transaction(&transaction).await?;
        tx.commit().await?;

        info!(
            transaction_id = transaction.id.as_str(),
            sale_ref = transaction.sale_ref.as_str(),
            source = event.source.as_str(),
            from = previous.as_str(),
            to = transaction.status.as_str(),
            payment_id = payment.as_ref().map(|p| p.id.as_str()),
            "Gateway transaction reconciled"
        );

        Ok(ReconcileOutcome {
            transaction_id: transaction.id,
            already_processed: false,
            status: transaction.status,
            payment,
        })
    }

    /// Record the failed event and its error without touching status or payment link
    async fn record_failure(&self, event: &GatewayEvent, failure: &AppError) -> Result<()> {
        let message = failure.to_string();

        self.retry
            .run("record_reconcile_failure", || async {
                let mut tx = self.store.begin().await?;

                let Some(mut transaction) = tx.gateway_transaction_for_update(&event.lookup_key).await?
                else {
                    return Ok(());
                };

                transaction.record_event(
                    event.source.as_str(),
                    serde_json::json!({ "error": message, "event": event.raw }),
                );
                transaction.error_message = Some(message.clone());

                tx.update_gateway_transaction(&transaction).await?;
                tx.commit().await
            })
            .await
    }
}

/// Build the Payment for a completed transaction and link it
fn link_gateway_payment(transaction: &mut GatewayTransaction, event: &GatewayEvent) -> Result<Payment> {
    let paid_at = event.occurred_at.unwrap_or_else(Utc::now);
    let method_name = transaction
        .payment_method_name
        .clone()
        .unwrap_or_else(|| "QR".to_string());

    let payment = Payment::new(
        transaction.sale_ref.clone(),
        transaction.amount,
        paid_at,
        PaymentMethod::Qr,
        Some(transaction.payment_reference()),
        GATEWAY_RECORDER,
        Some(format!("Pago procesado por PagoFácil QR - Método: {}", method_name)),
    )?;

    transaction.payment_id = Some(payment.id.clone());
    transaction.paid_at = Some(paid_at);
    transaction.error_message = None;

    Ok(payment)
}
