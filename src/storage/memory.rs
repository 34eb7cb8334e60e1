use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::core::traits::{LedgerStore, LedgerTx};
use crate::core::{AppError, Result};
use crate::modules::gateways::models::GatewayTransaction;
use crate::modules::installments::models::{Installment, InstallmentStatus};
use crate::modules::payments::models::{Payment, PaymentAllocation};
use crate::modules::receivables::models::{Receivable, ReceivableStatus};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    receivables: BTreeMap<String, Receivable>,
    installments: BTreeMap<String, Installment>,
    payments: BTreeMap<String, Payment>,
    allocations: Vec<PaymentAllocation>,
    gateway_transactions: BTreeMap<String, GatewayTransaction>,
}

impl LedgerState {
    fn receivable_by_sale(&self, sale_ref: &str) -> Option<&Receivable> {
        self.receivables.values().find(|r| r.sale_ref == sale_ref)
    }

    fn installments_of(&self, receivable_id: &str) -> Vec<Installment> {
        let mut list: Vec<Installment> = self
            .installments
            .values()
            .filter(|i| i.receivable_id == receivable_id)
            .cloned()
            .collect();
        list.sort_by_key(|i| i.sequence_number);
        list
    }

    fn gateway_transaction(&self, key: &str) -> Option<&GatewayTransaction> {
        self.gateway_transactions.get(key).or_else(|| {
            self.gateway_transactions.values().find(|t| {
                t.internal_transaction_id == key
                    || t.external_transaction_id.as_deref() == Some(key)
            })
        })
    }
}

/// In-process ledger store.
///
/// Every unit of work holds a store-wide async mutex, so units of work run one
/// at a time. Changes are made on a private copy and only published on commit.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
    commit_failures: Arc<Mutex<VecDeque<AppError>>>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail with `error` and roll back. Used to exercise
    /// failure paths such as lock conflicts.
    pub async fn fail_next_commit(&self, error: AppError) {
        self.commit_failures.lock().await.push_back(error);
    }

    /// All payment allocations, for inspection
    pub async fn allocations(&self) -> Vec<PaymentAllocation> {
        self.state.lock().await.allocations.clone()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();

        Ok(Box::new(InMemoryLedgerTx {
            guard,
            working,
            commit_failures: self.commit_failures.clone(),
        }))
    }

    async fn find_receivable(&self, id: &str) -> Result<Option<Receivable>> {
        Ok(self.state.lock().await.receivables.get(id).cloned())
    }

    async fn find_receivable_by_sale(&self, sale_ref: &str) -> Result<Option<Receivable>> {
        Ok(self.state.lock().await.receivable_by_sale(sale_ref).cloned())
    }

    async fn list_installments(&self, receivable_id: &str) -> Result<Vec<Installment>> {
        Ok(self.state.lock().await.installments_of(receivable_id))
    }

    async fn find_payment(&self, id: &str) -> Result<Option<Payment>> {
        Ok(self.state.lock().await.payments.get(id).cloned())
    }

    async fn list_payments(&self, sale_ref: &str) -> Result<Vec<Payment>> {
        let state = self.state.lock().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.sale_ref == sale_ref)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.paid_at);
        Ok(payments)
    }

    async fn find_gateway_transaction(&self, key: &str) -> Result<Option<GatewayTransaction>> {
        Ok(self.state.lock().await.gateway_transaction(key).cloned())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Unit of work over [`InMemoryLedgerStore`]
pub struct InMemoryLedgerTx {
    guard: OwnedMutexGuard<LedgerState>,
    working: LedgerState,
    commit_failures: Arc<Mutex<VecDeque<AppError>>>,
}

#[async_trait]
impl LedgerTx for InMemoryLedgerTx {
    async fn receivable_for_update(&mut self, id: &str) -> Result<Option<Receivable>> {
        Ok(self.working.receivables.get(id).cloned())
    }

    async fn receivable_by_sale_for_update(&mut self, sale_ref: &str) -> Result<Option<Receivable>> {
        Ok(self.working.receivable_by_sale(sale_ref).cloned())
    }

    async fn insert_receivable(&mut self, receivable: &Receivable) -> Result<()> {
        if self.working.receivable_by_sale(&receivable.sale_ref).is_some() {
            return Err(AppError::validation(format!(
                "Receivable already exists for sale {}",
                receivable.sale_ref
            )));
        }
        self.working
            .receivables
            .insert(receivable.id.clone(), receivable.clone());
        Ok(())
    }

    async fn update_receivable(&mut self, receivable: &Receivable) -> Result<()> {
        match self.working.receivables.get_mut(&receivable.id) {
            Some(existing) => {
                *existing = receivable.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Receivable not found")),
        }
    }

    async fn past_due_receivables_for_update(&mut self, today: NaiveDate) -> Result<Vec<Receivable>> {
        Ok(self
            .working
            .receivables
            .values()
            .filter(|r| r.status != ReceivableStatus::Paid)
            .filter(|r| r.due_date.map_or(false, |due| due < today))
            .cloned()
            .collect())
    }

    async fn installments_for_update(&mut self, receivable_id: &str) -> Result<Vec<Installment>> {
        Ok(self.working.installments_of(receivable_id))
    }

    async fn installment_for_update(&mut self, id: &str) -> Result<Option<Installment>> {
        Ok(self.working.installments.get(id).cloned())
    }

    async fn insert_installments(&mut self, installments: &[Installment]) -> Result<()> {
        for installment in installments {
            let duplicate = self.working.installments.values().any(|i| {
                i.receivable_id == installment.receivable_id
                    && i.sequence_number == installment.sequence_number
            });
            if duplicate {
                return Err(AppError::internal(format!(
                    "Duplicate installment sequence {} for receivable {}",
                    installment.sequence_number, installment.receivable_id
                )));
            }
            self.working
                .installments
                .insert(installment.id.clone(), installment.clone());
        }
        Ok(())
    }

    async fn update_installments(&mut self, installments: &[Installment]) -> Result<()> {
        for installment in installments {
            match self.working.installments.get_mut(&installment.id) {
                Some(existing) => *existing = installment.clone(),
                None => return Err(AppError::not_found("Installment not found")),
            }
        }
        Ok(())
    }

    async fn delete_installments(&mut self, receivable_id: &str) -> Result<u64> {
        let before = self.working.installments.len();
        self.working
            .installments
            .retain(|_, i| i.receivable_id != receivable_id);
        Ok((before - self.working.installments.len()) as u64)
    }

    async fn mark_installments_overdue(&mut self, today: NaiveDate) -> Result<u64> {
        let mut changed = 0;
        for installment in self.working.installments.values_mut() {
            if installment.status == InstallmentStatus::Pending && installment.mark_overdue_if_due(today) {
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn count_payments(&mut self, sale_ref: &str) -> Result<i64> {
        Ok(self
            .working
            .payments
            .values()
            .filter(|p| p.sale_ref == sale_ref)
            .count() as i64)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.working
            .payments
            .insert(payment.id.clone(), payment.clone());
        Ok(())
    }

    async fn payment_for_update(&mut self, id: &str) -> Result<Option<Payment>> {
        Ok(self.working.payments.get(id).cloned())
    }

    async fn update_payment_notes(&mut self, id: &str, notes: Option<&str>) -> Result<()> {
        match self.working.payments.get_mut(id) {
            Some(payment) => {
                payment.notes = notes.map(str::to_string);
                Ok(())
            }
            None => Err(AppError::not_found("Payment not found")),
        }
    }

    async fn delete_payment(&mut self, id: &str) -> Result<()> {
        self.working
            .payments
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| AppError::not_found("Payment not found"))
    }

    async fn insert_allocations(&mut self, allocations: &[PaymentAllocation]) -> Result<()> {
        self.working.allocations.extend_from_slice(allocations);
        Ok(())
    }

    async fn allocations_for_payment(&mut self, payment_id: &str) -> Result<Vec<PaymentAllocation>> {
        Ok(self
            .working
            .allocations
            .iter()
            .filter(|a| a.payment_id == payment_id)
            .cloned()
            .collect())
    }

    async fn delete_allocations(&mut self, payment_id: &str) -> Result<()> {
        self.working.allocations.retain(|a| a.payment_id != payment_id);
        Ok(())
    }

    async fn insert_gateway_transaction(&mut self, transaction: &GatewayTransaction) -> Result<()> {
        if self
            .working
            .gateway_transaction(&transaction.internal_transaction_id)
            .is_some()
        {
            return Err(AppError::conflict(format!(
                "Gateway transaction {} already exists",
                transaction.internal_transaction_id
            )));
        }
        self.working
            .gateway_transactions
            .insert(transaction.id.clone(), transaction.clone());
        Ok(())
    }

    async fn gateway_transaction_for_update(&mut self, key: &str) -> Result<Option<GatewayTransaction>> {
        Ok(self.working.gateway_transaction(key).cloned())
    }

    async fn update_gateway_transaction(&mut self, transaction: &GatewayTransaction) -> Result<()> {
        match self.working.gateway_transactions.get_mut(&transaction.id) {
            Some(existing) => {
                *existing = transaction.clone();
                Ok(())
            }
            None => Err(AppError::not_found("Gateway transaction not found")),
        }
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryLedgerTx {
            mut guard,
            working,
            commit_failures,
        } = *self;

        if let Some(error) = commit_failures.lock().await.pop_front() {
            return Err(error);
        }

        *guard = working;
        Ok(())
    }
}
