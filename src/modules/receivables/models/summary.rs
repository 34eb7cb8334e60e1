use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Receivable, ReceivableStatus};
use crate::core::money::{minimum_payable, percentage};
use crate::modules::installments::models::{open_in_payment_order, Installment, InstallmentStatus};

/// Read model: receivable balance plus installment counts
#[derive(Debug, Clone, Serialize)]
pub struct ReceivableSummary {
    pub receivable_id: String,
    pub sale_ref: String,
    pub status: ReceivableStatus,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub outstanding_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub installment_count: usize,
    pub paid_installments: usize,
    pub pending_installments: usize,
    pub overdue_installments: usize,
    /// Paid over total, rounded to 2 decimals
    pub percentage_paid: Decimal,
    pub installments: Vec<Installment>,
}

impl ReceivableSummary {
    pub fn build(receivable: &Receivable, installments: Vec<Installment>) -> Self {
        let count_with = |status: InstallmentStatus| {
            installments.iter().filter(|i| i.status == status).count()
        };

        Self {
            receivable_id: receivable.id.clone(),
            sale_ref: receivable.sale_ref.clone(),
            status: receivable.status,
            total_amount: receivable.total_amount,
            paid_amount: receivable.paid_amount,
            outstanding_amount: receivable.outstanding_amount,
            due_date: receivable.due_date,
            installment_count: installments.len(),
            paid_installments: count_with(InstallmentStatus::Paid),
            pending_installments: count_with(InstallmentStatus::Pending),
            overdue_installments: count_with(InstallmentStatus::Overdue),
            percentage_paid: percentage(receivable.paid_amount, receivable.total_amount),
            installments,
        }
    }
}

/// Read model: the next installment the customer should pay
#[derive(Debug, Clone, Serialize)]
pub struct NextPayment {
    pub installment_id: String,
    pub sequence_number: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    /// Whole days between today and the due date; `is_overdue` tells which side
    pub days_remaining: u64,
    pub is_overdue: bool,
    pub minimum_amount: Decimal,
    pub outstanding_amount: Decimal,
}

impl NextPayment {
    /// Earliest open installment in payment order. `None` once the receivable is paid
    /// or when no open installment remains.
    pub fn find(receivable: &Receivable, installments: &[Installment], today: NaiveDate) -> Option<Self> {
        if receivable.status == ReceivableStatus::Paid {
            return None;
        }

        let next = open_in_payment_order(installments).into_iter().next()?;
        let days = (next.due_date - today).num_days();

        Some(Self {
            installment_id: next.id.clone(),
            sequence_number: next.sequence_number,
            amount: next.amount,
            due_date: next.due_date,
            days_remaining: days.unsigned_abs(),
            is_overdue: days < 0,
            minimum_amount: minimum_payable().min(next.amount),
            outstanding_amount: receivable.outstanding_amount,
        })
    }
}
