use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// QR gateway transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayTransactionStatus {
    /// QR issued, waiting for the customer
    Pending,
    /// Gateway confirmed the payment
    Completed,
    /// QR expired unpaid
    Expired,
    /// Gateway reported a failure or rejection
    Failed,
    /// Cancelled locally before payment
    Cancelled,
}

impl Default for GatewayTransactionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl GatewayTransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Expired => "expired",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    /// Transitions only go forward out of `pending`
    pub fn can_transition_to(&self, next: Self) -> bool {
        !self.is_terminal() && next.is_terminal()
    }

    /// Map the numeric `paymentStatus` returned by a status query.
    /// Unknown codes are treated as still pending.
    pub fn from_gateway_code(code: i32) -> Self {
        match code {
            2 => Self::Completed,
            3 => Self::Expired,
            4 => Self::Failed,
            _ => Self::Pending,
        }
    }

    /// Map the free-text `Estado` of a webhook notification (case-insensitive substring match)
    pub fn from_webhook_text(estado: &str) -> Self {
        let estado = estado.to_lowercase();

        if estado.contains("completado") || estado.contains("exitoso") {
            Self::Completed
        } else if estado.contains("fallido") || estado.contains("rechazado") {
            Self::Failed
        } else if estado.contains("expirado") {
            Self::Expired
        } else {
            Self::Pending
        }
    }
}

impl std::fmt::Display for GatewayTransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GatewayTransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "expired" => Ok(Self::Expired),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid gateway transaction status: {}", s)),
        }
    }
}

impl TryFrom<String> for GatewayTransactionStatus {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

/// One outbound QR request and everything the gateway told us about it
///
/// Linked to at most one Payment, ever. `response_data` is a JSON array with one
/// entry per gateway interaction (QR generation, webhook, poll).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayTransaction {
    pub id: String,
    pub sale_ref: String,
    pub installment_id: Option<String>,
    /// Assigned by the gateway
    pub external_transaction_id: Option<String>,
    /// Generated by us and sent as the gateway's `paymentNumber`
    pub internal_transaction_id: String,
    pub amount: Decimal,
    pub status: GatewayTransactionStatus,
    pub payment_id: Option<String>,
    pub payment_method_id: Option<i32>,
    pub payment_method_name: Option<String>,
    pub qr_image: Option<String>,
    pub checkout_url: Option<String>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub response_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GatewayTransaction {
    /// Create a pending transaction for a freshly issued QR
    pub fn new_pending(
        sale_ref: impl Into<String>,
        installment_id: Option<String>,
        internal_transaction_id: impl Into<String>,
        amount: Decimal,
        payment_method_id: Option<i32>,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            sale_ref: sale_ref.into(),
            installment_id,
            external_transaction_id: None,
            internal_transaction_id: internal_transaction_id.into(),
            amount,
            status: GatewayTransactionStatus::Pending,
            payment_id: None,
            payment_method_id,
            payment_method_name: None,
            qr_image: None,
            checkout_url: None,
            expiration_date: None,
            paid_at: None,
            error_message: None,
            response_data: serde_json::Value::Array(Vec::new()),
            created_at: now,
            updated_at: now,
        }
    }

    /// Internal id for a whole-sale QR: `<sale_ref>-<unix ts>`
    pub fn sale_transaction_id(sale_ref: &str, now: DateTime<Utc>) -> String {
        format!("{}-{}", sale_ref, now.timestamp())
    }

    /// Internal id for an installment QR: `CUOTA-<installment id>-<unix ts>`
    pub fn installment_transaction_id(installment_id: &str, now: DateTime<Utc>) -> String {
        format!("CUOTA-{}-{}", installment_id, now.timestamp())
    }

    pub fn is_completed(&self) -> bool {
        self.status == GatewayTransactionStatus::Completed
    }

    /// Reference stored on the Payment: the gateway's id when known
    pub fn payment_reference(&self) -> String {
        self.external_transaction_id
            .clone()
            .unwrap_or_else(|| self.internal_transaction_id.clone())
    }

    /// Append one gateway interaction to the audit payload
    pub fn record_event(&mut self, source: &str, payload: serde_json::Value) {
        let entry = serde_json::json!({
            "source": source,
            "received_at": Utc::now().to_rfc3339(),
            "payload": payload,
        });

        match self.response_data {
            serde_json::Value::Array(ref mut events) => events.push(entry),
            ref mut other => {
                let previous = other.take();
                *other = if previous.is_null() {
                    serde_json::Value::Array(vec![entry])
                } else {
                    serde_json::Value::Array(vec![previous, entry])
                };
            }
        }
        self.updated_at = Utc::now();
    }

    /// Move to `next` if the transition is allowed.
    ///
    /// # Returns
    /// `true` if the status changed
    pub fn transition_to(&mut self, next: GatewayTransactionStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        self.updated_at = Utc::now();
        true
    }
}
