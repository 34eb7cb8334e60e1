use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::money::has_money_scale;
use crate::core::{AppError, Result};

/// Credit account opened for one sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receivable {
    pub id: String,
    /// Externally owned sale identifier, unique per receivable
    pub sale_ref: String,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    /// Always `total_amount - paid_amount`
    pub outstanding_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub status: ReceivableStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Receivable status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableStatus {
    Pending,
    Partial,
    Paid,
    Overdue,
}

impl ReceivableStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }
}

impl std::fmt::Display for ReceivableStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReceivableStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "partial" => Ok(Self::Partial),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            _ => Err(format!("Invalid receivable status: {}", s)),
        }
    }
}

impl TryFrom<String> for ReceivableStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Derive a receivable's status from its amounts and due date.
///
/// # Business Rules
/// Evaluated in order, first match wins:
/// 1. Nothing outstanding: `paid`
/// 2. Something already paid: `partial`
/// 3. Due date set and before today: `overdue`
/// 4. Otherwise: `pending`
///
/// A settled receivable is `paid` even when its due date has long passed.
pub fn derive_status(
    paid_amount: Decimal,
    outstanding_amount: Decimal,
    due_date: Option<NaiveDate>,
    today: NaiveDate,
) -> ReceivableStatus {
    if outstanding_amount <= Decimal::ZERO {
        ReceivableStatus::Paid
    } else if paid_amount > Decimal::ZERO {
        ReceivableStatus::Partial
    } else if due_date.map_or(false, |due| due < today) {
        ReceivableStatus::Overdue
    } else {
        ReceivableStatus::Pending
    }
}

impl Receivable {
    /// Open a receivable for a credit sale
    ///
    /// # Arguments
    /// * `sale_ref` - External sale identifier
    /// * `total_amount` - Amount financed, positive with at most two decimals
    /// * `due_date` - Optional final due date
    pub fn new(
        sale_ref: impl Into<String>,
        total_amount: Decimal,
        due_date: Option<NaiveDate>,
    ) -> Result<Self> {
        let sale_ref = sale_ref.into();

        if sale_ref.trim().is_empty() {
            return Err(AppError::validation("Sale reference cannot be empty"));
        }

        if total_amount <= Decimal::ZERO {
            return Err(AppError::validation("Receivable total must be positive"));
        }

        if !has_money_scale(total_amount) {
            return Err(AppError::validation(
                "Receivable total must have at most 2 decimal places",
            ));
        }

        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            sale_ref,
            total_amount,
            paid_amount: Decimal::ZERO,
            outstanding_amount: total_amount,
            due_date,
            status: ReceivableStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }

    /// Add a payment to the running balance and re-derive the status
    pub fn record_payment(&mut self, amount: Decimal, today: NaiveDate) {
        self.paid_amount += amount;
        self.outstanding_amount = self.total_amount - self.paid_amount;
        self.refresh_status(today);
    }

    /// Take a deleted payment back out of the running balance.
    /// This is the only path that moves a receivable out of `paid`.
    pub fn reverse_payment(&mut self, amount: Decimal, today: NaiveDate) {
        self.paid_amount -= amount;
        if self.paid_amount < Decimal::ZERO {
            self.paid_amount = Decimal::ZERO;
        }
        self.outstanding_amount = self.total_amount - self.paid_amount;
        self.refresh_status(today);
    }

    /// Re-run the status rules.
    ///
    /// # Returns
    /// `true` if the status changed
    pub fn refresh_status(&mut self, today: NaiveDate) -> bool {
        let next = derive_status(self.paid_amount, self.outstanding_amount, self.due_date, today);
        let changed = next != self.status;
        self.status = next;
        self.updated_at = Utc::now();
        changed
    }

    /// Validate a payment amount against the outstanding balance
    pub fn check_payment_amount(&self, amount: Decimal) -> Result<()> {
        if amount <= Decimal::ZERO {
            return Err(AppError::invalid_amount("Payment amount must be positive"));
        }

        if !has_money_scale(amount) {
            return Err(AppError::invalid_amount(
                "Payment amount must have at most 2 decimal places",
            ));
        }

        if amount > self.outstanding_amount {
            return Err(AppError::invalid_amount(format!(
                "Payment amount {} exceeds outstanding balance {}",
                amount, self.outstanding_amount
            )));
        }

        Ok(())
    }
}
