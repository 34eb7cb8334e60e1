use chrono::{Days, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::money::{has_money_scale, split_evenly};
use crate::core::{AppError, Result};

/// Upper bound on installments per receivable
pub const MAX_INSTALLMENTS: u32 = 12;

/// Days between installments on the credit-servicing path
pub const BIWEEKLY_INTERVAL_DAYS: u64 = 15;

/// How installment due dates are spaced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SpacingPolicy {
    /// Sales-driven path: installment `k` is due `first_due + (k-1)` months
    Monthly { first_due: NaiveDate },
    /// Credit-servicing path: installment `k` is due `from + 15*k` days
    Biweekly { from: NaiveDate },
}

impl SpacingPolicy {
    /// Monthly from an explicit first due date, otherwise every 15 days from `today`
    ///
    /// An explicit first due date must fall after `today`.
    pub fn for_request(first_due: Option<NaiveDate>, today: NaiveDate) -> Result<Self> {
        match first_due {
            Some(first_due) if first_due <= today => Err(AppError::invalid_schedule(format!(
                "First due date {} must be after {}",
                first_due, today
            ))),
            Some(first_due) => Ok(Self::Monthly { first_due }),
            None => Ok(Self::Biweekly { from: today }),
        }
    }

    /// Date the policy counts from
    pub fn anchor(&self) -> NaiveDate {
        match *self {
            Self::Monthly { first_due } => first_due,
            Self::Biweekly { from } => from,
        }
    }

    /// Due date of the 1-based installment `sequence`
    pub fn due_date(&self, sequence: u32) -> Result<NaiveDate> {
        let due = match *self {
            Self::Monthly { first_due } => {
                first_due.checked_add_months(Months::new(sequence.saturating_sub(1)))
            }
            Self::Biweekly { from } => {
                from.checked_add_days(Days::new(BIWEEKLY_INTERVAL_DAYS * u64::from(sequence)))
            }
        };

        due.ok_or_else(|| AppError::invalid_schedule("Failed to calculate due date"))
    }

    /// A custom first installment is due 15 days after the anchor under either policy
    fn custom_first_due_date(&self) -> Result<NaiveDate> {
        self.anchor()
            .checked_add_days(Days::new(BIWEEKLY_INTERVAL_DAYS))
            .ok_or_else(|| AppError::invalid_schedule("Failed to calculate due date"))
    }
}

/// One computed installment, before persistence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleLine {
    pub sequence_number: i32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Build an installment schedule.
///
/// Equal split: every installment gets `round(total / count, 2)` and the last one
/// absorbs the rounding remainder. With a custom first amount, installment 1 carries
/// that amount and the rest of the total is split equally over the other `count - 1`
/// installments, again with the remainder on the last one. The custom first
/// installment falls due 15 days after the spacing anchor; the others keep the
/// policy's cadence.
///
/// # Arguments
/// * `total_amount` - Amount to schedule, positive with at most two decimals
/// * `count` - Number of installments (1 to 12, at least 2 with a custom first amount)
/// * `first_installment_amount` - Optional custom amount for installment 1, `0 < first < total`
/// * `spacing` - Due date policy
///
/// # Returns
/// Lines ordered by sequence number whose amounts sum to `total_amount` exactly
pub fn build_schedule(
    total_amount: Decimal,
    count: u32,
    first_installment_amount: Option<Decimal>,
    spacing: SpacingPolicy,
) -> Result<Vec<ScheduleLine>> {
    if total_amount <= Decimal::ZERO || !has_money_scale(total_amount) {
        return Err(AppError::invalid_schedule(format!(
            "Total amount must be positive with at most 2 decimals, got {}",
            total_amount
        )));
    }

    if count > MAX_INSTALLMENTS {
        return Err(AppError::invalid_schedule(format!(
            "Installment count must be at most {}, got {}",
            MAX_INSTALLMENTS, count
        )));
    }

    let amounts = match first_installment_amount {
        None => {
            if count < 1 {
                return Err(AppError::invalid_schedule(
                    "Installment count must be at least 1",
                ));
            }
            split_evenly(total_amount, count)
                .ok_or_else(|| AppError::invalid_schedule("Installment count cannot be zero"))?
        }
        Some(first) => {
            if count < 2 {
                return Err(AppError::invalid_schedule(
                    "A custom first installment needs at least 2 installments",
                ));
            }
            if first <= Decimal::ZERO || first >= total_amount || !has_money_scale(first) {
                return Err(AppError::invalid_schedule(format!(
                    "First installment must be between 0 and {} exclusive, got {}",
                    total_amount, first
                )));
            }

            let rest = split_evenly(total_amount - first, count - 1)
                .ok_or_else(|| AppError::invalid_schedule("Installment count cannot be zero"))?;

            let mut amounts = Vec::with_capacity(count as usize);
            amounts.push(first);
            amounts.extend(rest);

            // Any residue against the total lands on the last installment only
            let residue = total_amount - amounts.iter().copied().sum::<Decimal>();
            if !residue.is_zero() {
                if let Some(last) = amounts.last_mut() {
                    *last += residue;
                }
            }
            amounts
        }
    };

    if let Some(bad) = amounts.iter().find(|a| **a <= Decimal::ZERO) {
        return Err(AppError::invalid_schedule(format!(
            "Total {} over {} installments yields a non-positive installment ({})",
            total_amount, count, bad
        )));
    }

    let lines = amounts
        .into_iter()
        .enumerate()
        .map(|(i, amount)| {
            let sequence = i as u32 + 1;
            let due_date = if sequence == 1 && first_installment_amount.is_some() {
                spacing.custom_first_due_date()?
            } else {
                spacing.due_date(sequence)?
            };
            Ok(ScheduleLine {
                sequence_number: sequence as i32,
                amount,
                due_date,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        total = %total_amount,
        count = count,
        custom_first = first_installment_amount.is_some(),
        "Built installment schedule"
    );

    Ok(lines)
}
