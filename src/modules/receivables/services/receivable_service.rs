use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::core::retry::ConflictRetry;
use crate::core::traits::LedgerStore;
use crate::core::{AppError, GatewayClock, Result};
use crate::modules::installments::models::Installment;
use crate::modules::installments::services::installment_service::{replace_schedule, ScheduleRequest};
use crate::modules::receivables::models::{NextPayment, Receivable, ReceivableSummary};

/// Credit sale data read once when the receivable is opened
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReceivableRequest {
    pub sale_ref: String,
    pub total_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    /// Generate the schedule in the same unit of work
    pub schedule: Option<ScheduleRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatedReceivable {
    pub receivable: Receivable,
    pub installments: Vec<Installment>,
}

/// Service for receivable lifecycle and read models
#[derive(Clone)]
pub struct ReceivableService {
    store: Arc<dyn LedgerStore>,
    clock: GatewayClock,
    retry: ConflictRetry,
}

impl ReceivableService {
    pub fn new(store: Arc<dyn LedgerStore>, clock: GatewayClock, retry: ConflictRetry) -> Self {
        Self { store, clock, retry }
    }

    /// Open a receivable for a credit sale
    ///
    /// # Arguments
    /// * `request` - Sale reference, total, optional due date and optional schedule
    ///
    /// # Business Rules
    /// - One receivable per sale
    /// - Starts with nothing paid and the full total outstanding
    /// - An invalid schedule aborts the whole creation
    pub async fn create(&self, request: CreateReceivableRequest) -> Result<CreatedReceivable> {
        let created = self
            .retry
            .run("create_receivable", || self.create_once(&request))
            .await?;

        info!(
            receivable_id = created.receivable.id.as_str(),
            sale_ref = created.receivable.sale_ref.as_str(),
            total = %created.receivable.total_amount,
            installments = created.installments.len(),
            "Receivable created"
        );

        Ok(created)
    }

    async fn create_once(&self, request: &CreateReceivableRequest) -> Result<CreatedReceivable> {
        let today = self.clock.today(Utc::now());
        let mut receivable = Receivable::new(
            request.sale_ref.trim(),
            request.total_amount,
            request.due_date,
        )?;
        receivable.refresh_status(today);

        let mut tx = self.store.begin().await?;

        if tx
            .receivable_by_sale_for_update(&receivable.sale_ref)
            .await?
            .is_some()
        {
            return Err(AppError::validation(format!(
                "Sale {} already has a receivable",
                receivable.sale_ref
            )));
        }

        tx.insert_receivable(&receivable).await?;

        let installments = match &request.schedule {
            Some(schedule) => replace_schedule(tx.as_mut(), &receivable, schedule, today).await?,
            None => Vec::new(),
        };

        tx.commit().await?;

        Ok(CreatedReceivable {
            receivable,
            installments,
        })
    }

    pub async fn get(&self, receivable_id: &str) -> Result<Receivable> {
        self.store
            .find_receivable(receivable_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Receivable {} not found", receivable_id)))
    }

    pub async fn get_by_sale(&self, sale_ref: &str) -> Result<Receivable> {
        self.store
            .find_receivable_by_sale(sale_ref)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Receivable for sale {} not found", sale_ref)))
    }

    /// Balance, installment counts and percentage paid
    pub async fn summary(&self, receivable_id: &str) -> Result<ReceivableSummary> {
        let receivable = self.get(receivable_id).await?;
        let installments = self.store.list_installments(&receivable.id).await?;

        Ok(ReceivableSummary::build(&receivable, installments))
    }

    /// Earliest open installment; `None` once the receivable is paid
    pub async fn next_payment(&self, receivable_id: &str) -> Result<Option<NextPayment>> {
        let receivable = self.get(receivable_id).await?;
        let installments = self.store.list_installments(&receivable.id).await?;
        let today = self.clock.today(Utc::now());

        Ok(NextPayment::find(&receivable, &installments, today))
    }
}
