use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::core::traits::LedgerStore;
use crate::core::{GatewayClock, Result};

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 86_400;

/// Counts from one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub installments_marked_overdue: u64,
    pub receivables_updated: usize,
}

/// Background job that promotes past-due installments and receivables
///
/// Each run is one unit of work: pending installments due before today become
/// overdue, and every unpaid receivable with a past due date has its status
/// re-derived. A tick that finds the previous run still going is skipped.
pub struct OverdueSweep {
    store: Arc<dyn LedgerStore>,
    clock: GatewayClock,
    period: Duration,
    running: Mutex<()>,
}

impl OverdueSweep {
    pub fn new(store: Arc<dyn LedgerStore>, clock: GatewayClock, period: Duration) -> Self {
        Self {
            store,
            clock,
            period,
            running: Mutex::new(()),
        }
    }

    /// Start the periodic sweep. Spawn this as a tokio task.
    pub async fn start(self: Arc<Self>) {
        info!(
            period_secs = self.period.as_secs(),
            "Starting overdue sweep"
        );

        let mut ticker = interval(self.period);

        loop {
            ticker.tick().await;

            match self.run_once().await {
                Ok(Some(report)) => {
                    if report.installments_marked_overdue > 0 || report.receivables_updated > 0 {
                        info!(
                            installments_marked_overdue = report.installments_marked_overdue,
                            receivables_updated = report.receivables_updated,
                            "Overdue sweep applied"
                        );
                    }
                }
                Ok(None) => {
                    warn!("Previous overdue sweep still running, tick skipped");
                }
                Err(e) => {
                    error!(error = %e, "Overdue sweep failed");
                }
            }
        }
    }

    /// Run one sweep for the current business date
    ///
    /// # Returns
    /// * `Ok(None)` if another sweep holds the guard
    pub async fn run_once(&self) -> Result<Option<SweepReport>> {
        self.run_for(self.clock.today(Utc::now())).await
    }

    /// Run one sweep as of `today`
    pub async fn run_for(&self, today: NaiveDate) -> Result<Option<SweepReport>> {
        let Ok(_guard) = self.running.try_lock() else {
            return Ok(None);
        };

        let mut tx = self.store.begin().await?;

        let installments_marked_overdue = tx.mark_installments_overdue(today).await?;

        let mut receivables_updated = 0;
        for mut receivable in tx.past_due_receivables_for_update(today).await? {
            if receivable.refresh_status(today) {
                debug!(
                    receivable_id = receivable.id.as_str(),
                    status = receivable.status.as_str(),
                    "Receivable status re-evaluated"
                );
                tx.update_receivable(&receivable).await?;
                receivables_updated += 1;
            }
        }

        tx.commit().await?;

        Ok(Some(SweepReport {
            installments_marked_overdue,
            receivables_updated,
        }))
    }
}
