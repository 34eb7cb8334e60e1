use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::retry::ConflictRetry;
use crate::core::traits::LedgerStore;
use crate::core::{AppError, GatewayClock, Result};
use crate::modules::installments::services::AllocationResult;
use crate::modules::payments::models::{Payment, PaymentMethod};
use crate::modules::payments::services::posting::{post_payment, reverse_payment};
use crate::modules::receivables::models::Receivable;

/// A payment entered by an operator
#[derive(Debug, Clone, Deserialize)]
pub struct ManualPayment {
    pub sale_ref: String,
    pub amount: Decimal,
    /// Defaults to now
    pub paid_at: Option<DateTime<Utc>>,
    pub method: PaymentMethod,
    pub reference: Option<String>,
    pub recorded_by: String,
    pub notes: Option<String>,
}

/// Result of recording a payment
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub receivable: Receivable,
    pub allocation: AllocationResult,
}

/// Service for manual payment entry, notes and deletion
#[derive(Clone)]
pub struct PaymentService {
    store: Arc<dyn LedgerStore>,
    clock: GatewayClock,
    retry: ConflictRetry,
}

impl PaymentService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: GatewayClock, retry: ConflictRetry) -> Self {
        Self { store, clock, retry }
    }

    /// Record a manual payment against a credit sale
    ///
    /// # Business Rules
    /// - QR payments are only created by gateway reconciliation
    /// - The sale must have a receivable
    /// - Amount must be positive and no larger than the outstanding balance
    /// - Payment, allocations, installments and receivable change together
    pub async fn record_payment(&self, input: ManualPayment) -> Result<PaymentReceipt> {
        if input.method == PaymentMethod::Qr {
            return Err(AppError::validation(
                "QR payments are recorded by gateway reconciliation only",
            ));
        }

        if input.recorded_by.trim().is_empty() {
            return Err(AppError::validation("recorded_by cannot be empty"));
        }

        let receipt = self
            .retry
            .run("record_payment", || self.record_once(&input))
            .await?;

        info!(
            payment_id = receipt.payment.id.as_str(),
            sale_ref = receipt.payment.sale_ref.as_str(),
            amount = %receipt.payment.amount,
            method = receipt.payment.method.as_str(),
            receivable_status = receipt.receivable.status.as_str(),
            outstanding = %receipt.receivable.outstanding_amount,
            "Manual payment recorded"
        );

        Ok(receipt)
    }

    async fn record_once(&self, input: &ManualPayment) -> Result<PaymentReceipt> {
        let now = Utc::now();
        let today = self.clock.today(now);

        let payment = Payment::new(
            input.sale_ref.clone(),
            input.amount,
            input.paid_at.unwrap_or(now),
            input.method,
            input.reference.clone(),
            input.recorded_by.clone(),
            input.notes.clone(),
        )?;

        let mut tx = self.store.begin().await?;

        // Manual entry needs a credit account; cash sales are paid at the till
        if tx.receivable_by_sale_for_update(&input.sale_ref).await?.is_none() {
            return Err(AppError::not_found(format!(
                "Receivable for sale {} not found",
                input.sale_ref
            )));
        }

        let outcome = post_payment(tx.as_mut(), &payment, None, today).await?;
        tx.commit().await?;

        match (outcome.receivable, outcome.allocation) {
            (Some(receivable), Some(allocation)) => Ok(PaymentReceipt {
                payment,
                receivable,
                allocation,
            }),
            _ => Err(AppError::internal("Payment posted without receivable")),
        }
    }

    pub async fn get(&self, payment_id: &str) -> Result<Payment> {
        self.store
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Payment {} not found", payment_id)))
    }

    /// Payments of a sale in the order they were made
    pub async fn list_for_sale(&self, sale_ref: &str) -> Result<Vec<Payment>> {
        self.store.list_payments(sale_ref).await
    }

    /// Append a line to the payment's notes
    pub async fn append_note(&self, payment_id: &str, note: &str) -> Result<Payment> {
        self.retry
            .run("append_note", || async {
                let mut tx = self.store.begin().await?;

                let mut payment = tx
                    .payment_for_update(payment_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Payment {} not found", payment_id)))?;

                payment.append_note(note)?;
                tx.update_payment_notes(&payment.id, payment.notes.as_deref())
                    .await?;
                tx.commit().await?;

                Ok(payment)
            })
            .await
    }

    /// Delete a payment and reverse exactly its own contribution
    ///
    /// # Returns
    /// * `Result<Option<Receivable>>` - The receivable after reversal, if the sale has one
    ///
    /// # Business Rules
    /// - Applies to every payment method, QR included
    /// - A linked gateway transaction stays completed and keeps its payment id,
    ///   so the gateway event can never be applied again
    pub async fn delete_payment(&self, payment_id: &str) -> Result<Option<Receivable>> {
        let receivable = self
            .retry
            .run("delete_payment", || async {
                let today = self.clock.today(Utc::now());
                let mut tx = self.store.begin().await?;

                let payment = tx
                    .payment_for_update(payment_id)
                    .await?
                    .ok_or_else(|| AppError::not_found(format!("Payment {} not found", payment_id)))?;

                let receivable = reverse_payment(tx.as_mut(), &payment, today).await?;
                tx.commit().await?;

                info!(
                    payment_id = payment_id,
                    sale_ref = payment.sale_ref.as_str(),
                    amount = %payment.amount,
                    method = payment.method.as_str(),
                    "Payment deleted and reversed"
                );

                Ok(receivable)
            })
            .await?;

        Ok(receivable)
    }
}
