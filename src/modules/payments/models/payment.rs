use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::money::has_money_scale;
use crate::core::{AppError, Result};

/// How a payment was collected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Transfer,
    Card,
    Check,
    /// Only created by gateway reconciliation
    Qr,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Transfer => "transfer",
            Self::Card => "card",
            Self::Check => "check",
            Self::Qr => "qr",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "transfer" => Ok(Self::Transfer),
            "card" => Ok(Self::Card),
            "check" => Ok(Self::Check),
            "qr" => Ok(Self::Qr),
            _ => Err(format!("Invalid payment method: {}", s)),
        }
    }
}

impl TryFrom<String> for PaymentMethod {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// Money received against a sale.
///
/// Immutable once created; only `notes` may grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub sale_ref: String,
    pub amount: Decimal,
    pub paid_at: DateTime<Utc>,
    pub method: PaymentMethod,
    /// External reference; `PAGO-<unix ts>` for manual entries without one
    pub reference: String,
    pub recorded_by: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Create a new payment
    ///
    /// # Arguments
    /// * `sale_ref` - Sale the money is applied to
    /// * `amount` - Positive amount with at most two decimals
    /// * `paid_at` - When the customer paid
    /// * `method` - Collection method
    /// * `reference` - External reference, generated if absent
    /// * `recorded_by` - Operator or system that recorded it
    /// * `notes` - Optional free text
    pub fn new(
        sale_ref: impl Into<String>,
        amount: Decimal,
        paid_at: DateTime<Utc>,
        method: PaymentMethod,
        reference: Option<String>,
        recorded_by: impl Into<String>,
        notes: Option<String>,
    ) -> Result<Self> {
        if amount <= Decimal::ZERO || !has_money_scale(amount) {
            return Err(AppError::invalid_amount(format!(
                "Payment amount must be positive with at most 2 decimals, got {}",
                amount
            )));
        }

        let now = Utc::now();
        let reference = reference
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| default_reference(now));

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            sale_ref: sale_ref.into(),
            amount,
            paid_at,
            method,
            reference,
            recorded_by: recorded_by.into(),
            notes: notes.filter(|n| !n.trim().is_empty()),
            created_at: now,
        })
    }

    /// Append a line to the notes; existing text is never rewritten
    pub fn append_note(&mut self, note: &str) -> Result<()> {
        let note = note.trim();
        if note.is_empty() {
            return Err(AppError::validation("Note cannot be empty"));
        }

        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{}\n{}", existing, note),
            None => note.to_string(),
        });

        Ok(())
    }
}

/// Reference used for manual payments entered without one
pub fn default_reference(now: DateTime<Utc>) -> String {
    format!("PAGO-{}", now.timestamp())
}

/// Portion of a payment applied to one installment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentAllocation {
    pub id: String,
    pub payment_id: String,
    pub installment_id: String,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl PaymentAllocation {
    pub fn new(payment_id: impl Into<String>, installment_id: impl Into<String>, amount: Decimal) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            payment_id: payment_id.into(),
            installment_id: installment_id.into(),
            amount,
            created_at: Utc::now(),
        }
    }
}
