use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One installment of a receivable's payment schedule.
///
/// After a partial payment `amount` holds the *remaining* balance of the
/// installment, not the originally scheduled amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub id: String,
    pub receivable_id: String,
    /// Sequential number (1, 2, 3...) unique within the receivable
    pub sequence_number: i32,
    /// Remaining balance of this installment
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_date: Option<NaiveDate>,
    pub status: InstallmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    /// Not yet paid, due date not passed
    Pending,
    /// Fully covered by payments
    Paid,
    /// Due date passed without full payment
    Overdue,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    /// Open installments still carry a balance
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::Overdue)
    }
}

impl std::fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for InstallmentStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "overdue" => Ok(Self::Overdue),
            _ => Err(format!("Invalid installment status: {}", s)),
        }
    }
}

impl TryFrom<String> for InstallmentStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl Installment {
    /// Create a new pending installment
    ///
    /// # Arguments
    /// * `receivable_id` - Parent receivable ID
    /// * `sequence_number` - Sequential number (1-based)
    /// * `amount` - Scheduled amount
    /// * `due_date` - Payment due date
    pub fn new(
        receivable_id: impl Into<String>,
        sequence_number: i32,
        amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            receivable_id: receivable_id.into(),
            sequence_number,
            amount,
            due_date,
            paid_date: None,
            status: InstallmentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    /// Mark installment as fully paid. The remaining `amount` is left as it was.
    pub fn settle(&mut self, today: NaiveDate) {
        self.status = InstallmentStatus::Paid;
        self.paid_date = Some(today);
        self.updated_at = Utc::now();
    }

    /// Reduce the remaining balance after a partial payment. Status and sequence are kept.
    pub fn consume(&mut self, amount: Decimal) {
        self.amount -= amount;
        self.updated_at = Utc::now();
    }

    /// Promote a pending installment whose due date has passed.
    ///
    /// # Returns
    /// `true` if the status changed
    pub fn mark_overdue_if_due(&mut self, today: NaiveDate) -> bool {
        if self.status == InstallmentStatus::Pending && self.due_date < today {
            self.status = InstallmentStatus::Overdue;
            self.updated_at = Utc::now();
            return true;
        }
        false
    }

    /// Give back an amount previously allocated to this installment.
    ///
    /// A paid installment reopens with exactly the returned amount as its balance;
    /// an open installment gets the amount added to what it still owes.
    pub fn restore(&mut self, amount: Decimal, today: NaiveDate) {
        if self.status == InstallmentStatus::Paid {
            self.amount = amount;
            self.paid_date = None;
            self.status = if self.due_date < today {
                InstallmentStatus::Overdue
            } else {
                InstallmentStatus::Pending
            };
        } else {
            self.amount += amount;
        }
        self.updated_at = Utc::now();
    }
}

/// Open installments in payment order: due date ascending, then sequence number.
pub fn open_in_payment_order(installments: &[Installment]) -> Vec<&Installment> {
    let mut open: Vec<&Installment> = installments.iter().filter(|i| i.is_open()).collect();
    open.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then(a.sequence_number.cmp(&b.sequence_number))
    });
    open
}

/// Sum of what open installments still owe
pub fn open_balance(installments: &[Installment]) -> Decimal {
    installments
        .iter()
        .filter(|i| i.is_open())
        .map(|i| i.amount)
        .sum()
}
