use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::core::traits::LedgerTx;
use crate::core::{AppError, Result};
use crate::modules::installments::models::Installment;
use crate::modules::installments::services::allocator::{
    apply_payment, apply_payment_to_installment, AllocationResult,
};
use crate::modules::payments::models::{Payment, PaymentAllocation};
use crate::modules::receivables::models::Receivable;

/// What posting a payment did to the ledger
#[derive(Debug, Clone)]
pub struct PostingOutcome {
    /// Receivable after the payment; `None` for a sale without credit account
    pub receivable: Option<Receivable>,
    pub allocation: Option<AllocationResult>,
}

/// Write a payment and its effect on the sale's receivable inside `tx`.
///
/// # Business Rules
/// - Without a receivable (cash sale) only the payment row is written
/// - With a receivable the amount must not exceed the outstanding balance
/// - `target_installment` aims the payment at one installment first
/// - Payment, allocations, installments and receivable are written together
pub(crate) async fn post_payment(
    tx: &mut dyn LedgerTx,
    payment: &Payment,
    target_installment: Option<&str>,
    today: NaiveDate,
) -> Result<PostingOutcome> {
    let Some(mut receivable) = tx.receivable_by_sale_for_update(&payment.sale_ref).await? else {
        tx.insert_payment(payment).await?;
        debug!(
            payment_id = payment.id.as_str(),
            sale_ref = payment.sale_ref.as_str(),
            "Payment recorded for sale without receivable"
        );
        return Ok(PostingOutcome {
            receivable: None,
            allocation: None,
        });
    };

    let installments = tx.installments_for_update(&receivable.id).await?;

    let allocation = match target_installment {
        Some(target) => {
            apply_payment_to_installment(&receivable, &installments, target, payment.amount, today)?
        }
        None => apply_payment(&receivable, &installments, payment.amount, today)?,
    };

    tx.insert_payment(payment).await?;

    let touched: Vec<Installment> = allocation.touched_installments();
    if !touched.is_empty() {
        tx.update_installments(&touched).await?;
    }

    let allocations: Vec<PaymentAllocation> = allocation
        .allocations
        .iter()
        .map(|line| PaymentAllocation::new(&payment.id, &line.installment_id, line.amount))
        .collect();
    if !allocations.is_empty() {
        tx.insert_allocations(&allocations).await?;
    }

    if !allocation.unallocated.is_zero() {
        warn!(
            payment_id = payment.id.as_str(),
            receivable_id = receivable.id.as_str(),
            unallocated = %allocation.unallocated,
            "Payment exceeds open installments; remainder applied to receivable only"
        );
    }

    receivable.record_payment(payment.amount, today);
    tx.update_receivable(&receivable).await?;

    Ok(PostingOutcome {
        receivable: Some(receivable),
        allocation: Some(allocation),
    })
}

/// Undo exactly what a payment contributed, then remove it.
///
/// Each allocation goes back to its installment and the receivable's paid
/// amount drops by the payment amount.
pub(crate) async fn reverse_payment(
    tx: &mut dyn LedgerTx,
    payment: &Payment,
    today: NaiveDate,
) -> Result<Option<Receivable>> {
    let allocations = tx.allocations_for_payment(&payment.id).await?;
    let receivable = tx.receivable_by_sale_for_update(&payment.sale_ref).await?;

    let receivable = match receivable {
        Some(mut receivable) => {
            let mut installments = tx.installments_for_update(&receivable.id).await?;
            let mut touched = Vec::with_capacity(allocations.len());

            for allocation in &allocations {
                let installment = installments
                    .iter_mut()
                    .find(|i| i.id == allocation.installment_id)
                    .ok_or_else(|| {
                        AppError::internal(format!(
                            "Allocation {} points to missing installment {}",
                            allocation.id, allocation.installment_id
                        ))
                    })?;
                installment.restore(allocation.amount, today);
                touched.push(installment.clone());
            }

            if !touched.is_empty() {
                tx.update_installments(&touched).await?;
            }

            receivable.reverse_payment(payment.amount, today);
            tx.update_receivable(&receivable).await?;
            Some(receivable)
        }
        None => None,
    };

    tx.delete_allocations(&payment.id).await?;
    tx.delete_payment(&payment.id).await?;

    Ok(receivable)
}
