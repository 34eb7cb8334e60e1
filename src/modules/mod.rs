pub mod gateways;
pub mod health;
pub mod installments;
pub mod payments;
pub mod receivables;
pub mod reconciliation;
