// Installment schedule operations
//
// Builds schedules through the scheduler and persists them in one unit of
// work, replacing any previous schedule while no payment has been applied.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use crate::core::retry::ConflictRetry;
use crate::core::traits::{LedgerStore, LedgerTx};
use crate::core::{AppError, GatewayClock, Result};
use crate::modules::installments::models::Installment;
use crate::modules::installments::services::scheduler::{build_schedule, SpacingPolicy};
use crate::modules::receivables::models::Receivable;

/// Schedule parameters as accepted from callers
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    /// Number of installments (1 to 12)
    pub count: u32,
    /// Optional custom amount for installment 1
    pub first_installment_amount: Option<Decimal>,
    /// First due date for monthly spacing; every 15 days from today when absent
    pub first_due: Option<NaiveDate>,
}

/// Service for installment schedule business logic
#[derive(Clone)]
pub struct InstallmentService {
    store: Arc<dyn LedgerStore>,
    clock: GatewayClock,
    retry: ConflictRetry,
}

impl InstallmentService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: GatewayClock, retry: ConflictRetry) -> Self {
        Self { store, clock, retry }
    }

    /// Generate (or regenerate) the schedule of a receivable
    ///
    /// # Arguments
    /// * `receivable_id` - Receivable to schedule
    /// * `request` - Count, optional custom first amount, optional first due date
    ///
    /// # Returns
    /// * `Result<Vec<Installment>>` - The persisted schedule
    ///
    /// # Business Rules
    /// - The schedule covers the receivable's total amount
    /// - Regeneration is refused with `ScheduleLocked` once anything was paid
    pub async fn generate_schedule(
        &self,
        receivable_id: &str,
        request: &ScheduleRequest,
    ) -> Result<Vec<Installment>> {
        self.retry
            .run("generate_schedule", || self.generate_once(receivable_id, request))
            .await
    }

    async fn generate_once(&self, receivable_id: &str, request: &ScheduleRequest) -> Result<Vec<Installment>> {
        let today = self.clock.today(Utc::now());
        let mut tx = self.store.begin().await?;

        let receivable = tx
            .receivable_for_update(receivable_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Receivable {} not found", receivable_id)))?;

        let installments = replace_schedule(tx.as_mut(), &receivable, request, today).await?;

        tx.commit().await?;

        info!(
            receivable_id = receivable_id,
            sale_ref = receivable.sale_ref.as_str(),
            installments = installments.len(),
            "Installment schedule generated"
        );

        Ok(installments)
    }

    /// Installments of a receivable, ordered by sequence number
    pub async fn list(&self, receivable_id: &str) -> Result<Vec<Installment>> {
        self.store.list_installments(receivable_id).await
    }
}

/// Build a schedule for `receivable` and swap it in for the current one.
///
/// Runs inside the caller's unit of work; the receivable row must already be locked.
pub(crate) async fn replace_schedule(
    tx: &mut dyn LedgerTx,
    receivable: &Receivable,
    request: &ScheduleRequest,
    today: NaiveDate,
) -> Result<Vec<Installment>> {
    if receivable.paid_amount > Decimal::ZERO {
        return Err(AppError::schedule_locked(format!(
            "Receivable {} already has {} paid",
            receivable.id, receivable.paid_amount
        )));
    }

    if tx.count_payments(&receivable.sale_ref).await? > 0 {
        return Err(AppError::schedule_locked(format!(
            "Sale {} already has payments",
            receivable.sale_ref
        )));
    }

    let spacing = SpacingPolicy::for_request(request.first_due, today)?;
    let lines = build_schedule(
        receivable.total_amount,
        request.count,
        request.first_installment_amount,
        spacing,
    )?;

    let installments: Vec<Installment> = lines
        .into_iter()
        .map(|line| Installment::new(&receivable.id, line.sequence_number, line.amount, line.due_date))
        .collect();

    tx.delete_installments(&receivable.id).await?;
    tx.insert_installments(&installments).await?;

    Ok(installments)
}
