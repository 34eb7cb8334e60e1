use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{MySql, MySqlPool, Transaction};

use crate::core::traits::{LedgerStore, LedgerTx};
use crate::core::Result;
use crate::modules::gateways::models::GatewayTransaction;
use crate::modules::gateways::repositories::GatewayTransactionRepository;
use crate::modules::installments::models::Installment;
use crate::modules::installments::repositories::InstallmentRepository;
use crate::modules::payments::models::{Payment, PaymentAllocation};
use crate::modules::payments::repositories::PaymentRepository;
use crate::modules::receivables::models::Receivable;
use crate::modules::receivables::repositories::ReceivableRepository;

/// Ledger store backed by MySQL.
///
/// Units of work are database transactions; `*_for_update` reads use
/// `SELECT ... FOR UPDATE` so concurrent writers to the same rows serialize.
#[derive(Clone)]
pub struct MySqlLedgerStore {
    pool: MySqlPool,
    receivables: ReceivableRepository,
    installments: InstallmentRepository,
    payments: PaymentRepository,
    gateway_transactions: GatewayTransactionRepository,
}

impl MySqlLedgerStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            receivables: ReceivableRepository::new(pool.clone()),
            installments: InstallmentRepository::new(pool.clone()),
            payments: PaymentRepository::new(pool.clone()),
            gateway_transactions: GatewayTransactionRepository::new(pool.clone()),
            pool,
        }
    }
}

#[async_trait]
impl LedgerStore for MySqlLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(MySqlLedgerTx { tx }))
    }

    async fn find_receivable(&self, id: &str) -> Result<Option<Receivable>> {
        self.receivables.find_by_id(id).await
    }

    async fn find_receivable_by_sale(&self, sale_ref: &str) -> Result<Option<Receivable>> {
        self.receivables.find_by_sale(sale_ref).await
    }

    async fn list_installments(&self, receivable_id: &str) -> Result<Vec<Installment>> {
        self.installments.find_by_receivable(receivable_id).await
    }

    async fn find_payment(&self, id: &str) -> Result<Option<Payment>> {
        self.payments.find_by_id(id).await
    }

    async fn list_payments(&self, sale_ref: &str) -> Result<Vec<Payment>> {
        self.payments.find_by_sale(sale_ref).await
    }

    async fn find_gateway_transaction(&self, key: &str) -> Result<Option<GatewayTransaction>> {
        self.gateway_transactions.find_by_key(key).await
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// A MySQL transaction. Dropping it without commit rolls back.
pub struct MySqlLedgerTx {
    tx: Transaction<'static, MySql>,
}

#[async_trait]
impl LedgerTx for MySqlLedgerTx {
    async fn receivable_for_update(&mut self, id: &str) -> Result<Option<Receivable>> {
        ReceivableRepository::find_by_id_for_update(&mut self.tx, id).await
    }

    async fn receivable_by_sale_for_update(&mut self, sale_ref: &str) -> Result<Option<Receivable>> {
        ReceivableRepository::find_by_sale_for_update(&mut self.tx, sale_ref).await
    }

    async fn insert_receivable(&mut self, receivable: &Receivable) -> Result<()> {
        ReceivableRepository::insert(&mut self.tx, receivable).await
    }

    async fn update_receivable(&mut self, receivable: &Receivable) -> Result<()> {
        ReceivableRepository::update(&mut self.tx, receivable).await
    }

    async fn past_due_receivables_for_update(&mut self, today: NaiveDate) -> Result<Vec<Receivable>> {
        ReceivableRepository::find_past_due_for_update(&mut self.tx, today).await
    }

    async fn installments_for_update(&mut self, receivable_id: &str) -> Result<Vec<Installment>> {
        InstallmentRepository::find_by_receivable_for_update(&mut self.tx, receivable_id).await
    }

    async fn installment_for_update(&mut self, id: &str) -> Result<Option<Installment>> {
        InstallmentRepository::find_by_id_for_update(&mut self.tx, id).await
    }

    async fn insert_installments(&mut self, installments: &[Installment]) -> Result<()> {
        InstallmentRepository::insert_batch(&mut self.tx, installments).await
    }

    async fn update_installments(&mut self, installments: &[Installment]) -> Result<()> {
        InstallmentRepository::update_batch(&mut self.tx, installments).await
    }

    async fn delete_installments(&mut self, receivable_id: &str) -> Result<u64> {
        InstallmentRepository::delete_by_receivable(&mut self.tx, receivable_id).await
    }

    async fn mark_installments_overdue(&mut self, today: NaiveDate) -> Result<u64> {
        InstallmentRepository::mark_overdue(&mut self.tx, today).await
    }

    async fn count_payments(&mut self, sale_ref: &str) -> Result<i64> {
        PaymentRepository::count_by_sale(&mut self.tx, sale_ref).await
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        PaymentRepository::insert(&mut self.tx, payment).await
    }

    async fn payment_for_update(&mut self, id: &str) -> Result<Option<Payment>> {
        PaymentRepository::find_by_id_for_update(&mut self.tx, id).await
    }

    async fn update_payment_notes(&mut self, id: &str, notes: Option<&str>) -> Result<()> {
        PaymentRepository::update_notes(&mut self.tx, id, notes).await
    }

    async fn delete_payment(&mut self, id: &str) -> Result<()> {
        PaymentRepository::delete(&mut self.tx, id).await
    }

    async fn insert_allocations(&mut self, allocations: &[PaymentAllocation]) -> Result<()> {
        PaymentRepository::insert_allocations(&mut self.tx, allocations).await
    }

    async fn allocations_for_payment(&mut self, payment_id: &str) -> Result<Vec<PaymentAllocation>> {
        PaymentRepository::find_allocations_for_update(&mut self.tx, payment_id).await
    }

    async fn delete_allocations(&mut self, payment_id: &str) -> Result<()> {
        PaymentRepository::delete_allocations(&mut self.tx, payment_id).await
    }

    async fn insert_gateway_transaction(&mut self, transaction: &GatewayTransaction) -> Result<()> {
        GatewayTransactionRepository::insert(&mut self.tx, transaction).await
    }

    async fn gateway_transaction_for_update(&mut self, key: &str) -> Result<Option<GatewayTransaction>> {
        GatewayTransactionRepository::find_by_key_for_update(&mut self.tx, key).await
    }

    async fn update_gateway_transaction(&mut self, transaction: &GatewayTransaction) -> Result<()> {
        GatewayTransactionRepository::update(&mut self.tx, transaction).await
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
