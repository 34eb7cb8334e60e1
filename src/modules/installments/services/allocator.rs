use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::core::Result;
use crate::modules::installments::models::{open_in_payment_order, Installment};
use crate::modules::receivables::models::Receivable;

/// Portion of a payment applied to one installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationLine {
    pub installment_id: String,
    pub amount: Decimal,
}

/// Outcome of applying a payment to a receivable's installments.
///
/// Installments are returned as updated copies; the inputs are never mutated.
#[derive(Debug, Clone, Serialize)]
pub struct AllocationResult {
    /// Installments fully covered by this payment
    pub paid_installments: Vec<Installment>,
    /// The installment the payment ran out on, with its reduced balance
    pub partially_paid_installment: Option<Installment>,
    /// One line per installment touched, in the order they were consumed
    pub allocations: Vec<AllocationLine>,
    /// Amount left after every open installment was covered
    pub unallocated: Decimal,
    /// Receivable outstanding balance after the payment
    pub remaining_outstanding: Decimal,
    pub settled: bool,
}

impl AllocationResult {
    /// Every installment changed by the payment
    pub fn touched_installments(&self) -> Vec<Installment> {
        self.paid_installments
            .iter()
            .chain(self.partially_paid_installment.iter())
            .cloned()
            .collect()
    }
}

/// Apply a payment oldest-first across open installments.
///
/// # Business Rules
/// - `amount` must be positive and no larger than the receivable's outstanding balance
/// - Open installments (pending or overdue) are consumed by due date, then sequence number
/// - A fully covered installment becomes paid with `paid_date = today`
/// - A partially covered installment keeps its status and has its balance reduced in place
/// - Whatever is left after the last open installment is reported as `unallocated`
///   and still counts toward the receivable
///
/// # Returns
/// The allocation plan; the caller persists it together with
/// `Receivable::record_payment` in one unit of work.
pub fn apply_payment(
    receivable: &Receivable,
    installments: &[Installment],
    amount: Decimal,
    today: NaiveDate,
) -> Result<AllocationResult> {
    receivable.check_payment_amount(amount)?;

    let order = open_in_payment_order(installments);
    Ok(allocate(receivable, order, amount, today))
}

/// Apply a payment aimed at one installment.
///
/// The target is consumed first; any excess flows to the remaining open
/// installments in normal payment order, so the amount is applied exactly once.
/// If the target is no longer open this is the same as [`apply_payment`].
pub fn apply_payment_to_installment(
    receivable: &Receivable,
    installments: &[Installment],
    target_installment_id: &str,
    amount: Decimal,
    today: NaiveDate,
) -> Result<AllocationResult> {
    receivable.check_payment_amount(amount)?;

    let mut order = open_in_payment_order(installments);
    if let Some(pos) = order.iter().position(|i| i.id == target_installment_id) {
        let target = order.remove(pos);
        order.insert(0, target);
    }

    Ok(allocate(receivable, order, amount, today))
}

fn allocate(
    receivable: &Receivable,
    order: Vec<&Installment>,
    amount: Decimal,
    today: NaiveDate,
) -> AllocationResult {
    let mut remaining = amount;
    let mut paid_installments = Vec::new();
    let mut partially_paid_installment = None;
    let mut allocations = Vec::new();

    for installment in order {
        if remaining <= Decimal::ZERO {
            break;
        }

        let mut updated = installment.clone();

        if remaining >= installment.amount {
            remaining -= installment.amount;
            allocations.push(AllocationLine {
                installment_id: installment.id.clone(),
                amount: installment.amount,
            });
            updated.settle(today);
            paid_installments.push(updated);
        } else {
            allocations.push(AllocationLine {
                installment_id: installment.id.clone(),
                amount: remaining,
            });
            updated.consume(remaining);
            remaining = Decimal::ZERO;
            partially_paid_installment = Some(updated);
        }
    }

    let remaining_outstanding = receivable.total_amount - (receivable.paid_amount + amount);

    AllocationResult {
        paid_installments,
        partially_paid_installment,
        allocations,
        unallocated: remaining,
        remaining_outstanding,
        settled: remaining_outstanding <= Decimal::ZERO,
    }
}
