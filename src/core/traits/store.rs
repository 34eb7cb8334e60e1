use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::Result;
use crate::modules::gateways::models::GatewayTransaction;
use crate::modules::installments::models::Installment;
use crate::modules::payments::models::{Payment, PaymentAllocation};
use crate::modules::receivables::models::Receivable;

/// Persistence port for the receivable ledger.
///
/// Reads on the store itself take no locks and are meant for read models.
/// Every mutation goes through a [`LedgerTx`] opened with [`LedgerStore::begin`].
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Open a unit of work
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    async fn find_receivable(&self, id: &str) -> Result<Option<Receivable>>;

    async fn find_receivable_by_sale(&self, sale_ref: &str) -> Result<Option<Receivable>>;

    /// Installments of a receivable ordered by sequence number
    async fn list_installments(&self, receivable_id: &str) -> Result<Vec<Installment>>;

    async fn find_payment(&self, id: &str) -> Result<Option<Payment>>;

    /// Payments of a sale ordered by `paid_at`
    async fn list_payments(&self, sale_ref: &str) -> Result<Vec<Payment>>;

    /// Look up by row id, internal transaction id or external transaction id
    async fn find_gateway_transaction(&self, key: &str) -> Result<Option<GatewayTransaction>>;

    /// Connectivity probe for readiness checks
    async fn ping(&self) -> Result<()>;
}

/// A unit of work over the ledger.
///
/// `*_for_update` reads lock the returned rows until the unit of work ends.
/// Dropping a `LedgerTx` without calling [`LedgerTx::commit`] rolls it back.
#[async_trait]
pub trait LedgerTx: Send {
    async fn receivable_for_update(&mut self, id: &str) -> Result<Option<Receivable>>;

    async fn receivable_by_sale_for_update(&mut self, sale_ref: &str) -> Result<Option<Receivable>>;

    async fn insert_receivable(&mut self, receivable: &Receivable) -> Result<()>;

    async fn update_receivable(&mut self, receivable: &Receivable) -> Result<()>;

    /// Receivables not yet paid whose due date is before `today`
    async fn past_due_receivables_for_update(&mut self, today: NaiveDate) -> Result<Vec<Receivable>>;

    /// Installments of a receivable ordered by sequence number
    async fn installments_for_update(&mut self, receivable_id: &str) -> Result<Vec<Installment>>;

    async fn installment_for_update(&mut self, id: &str) -> Result<Option<Installment>>;

    async fn insert_installments(&mut self, installments: &[Installment]) -> Result<()>;

    async fn update_installments(&mut self, installments: &[Installment]) -> Result<()>;

    /// Returns the number of rows removed
    async fn delete_installments(&mut self, receivable_id: &str) -> Result<u64>;

    /// Promote every pending installment due before `today` to overdue.
    /// Returns the number of rows changed.
    async fn mark_installments_overdue(&mut self, today: NaiveDate) -> Result<u64>;

    async fn count_payments(&mut self, sale_ref: &str) -> Result<i64>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn payment_for_update(&mut self, id: &str) -> Result<Option<Payment>>;

    async fn update_payment_notes(&mut self, id: &str, notes: Option<&str>) -> Result<()>;

    async fn delete_payment(&mut self, id: &str) -> Result<()>;

    async fn insert_allocations(&mut self, allocations: &[PaymentAllocation]) -> Result<()>;

    async fn allocations_for_payment(&mut self, payment_id: &str) -> Result<Vec<PaymentAllocation>>;

    async fn delete_allocations(&mut self, payment_id: &str) -> Result<()>;

    async fn insert_gateway_transaction(&mut self, transaction: &GatewayTransaction) -> Result<()>;

    /// Look up by row id, internal transaction id or external transaction id
    async fn gateway_transaction_for_update(&mut self, key: &str) -> Result<Option<GatewayTransaction>>;

    async fn update_gateway_transaction(&mut self, transaction: &GatewayTransaction) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
