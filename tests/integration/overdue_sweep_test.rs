// Integration tests for the periodic overdue sweep

#[path = "../helpers/mod.rs"]
mod helpers;

use std::time::Duration;

use chrono::NaiveDate;
use cobranza::installments::{InstallmentStatus, ScheduleRequest};
use cobranza::payments::{ManualPayment, PaymentMethod};
use cobranza::receivables::services::{CreateReceivableRequest, CreatedReceivable};
use cobranza::receivables::ReceivableStatus;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Receivable with monthly installments from 2030-01-10 and a final due date of 2030-03-10
async fn monthly_receivable(app: &helpers::TestApp, sale_ref: &str, total: Decimal) -> CreatedReceivable {
    app.services
        .receivables
        .create(CreateReceivableRequest {
            sale_ref: sale_ref.to_string(),
            total_amount: total,
            due_date: Some(date(2030, 3, 10)),
            schedule: Some(ScheduleRequest {
                count: 3,
                first_installment_amount: None,
                first_due: Some(date(2030, 1, 10)),
            }),
        })
        .await
        .unwrap()
}

async fn pay(app: &helpers::TestApp, sale_ref: &str, amount: Decimal) {
    app.services
        .payments
        .record_payment(ManualPayment {
            sale_ref: sale_ref.to_string(),
            amount,
            paid_at: None,
            method: PaymentMethod::Cash,
            reference: None,
            recorded_by: "cajero-1".to_string(),
            notes: None,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_past_due_installments_become_overdue() {
    let app = helpers::test_app();
    let created = monthly_receivable(&app, "V-400", dec!(300.00)).await;
    let sweep = app.services.overdue_sweep(Duration::from_secs(3600));

    let report = sweep.run_for(date(2030, 3, 1)).await.unwrap().unwrap();
    assert_eq!(report.installments_marked_overdue, 2);
    assert_eq!(report.receivables_updated, 0);

    let installments = app
        .services
        .installments
        .list(&created.receivable.id)
        .await
        .unwrap();
    assert_eq!(installments[0].status, InstallmentStatus::Overdue);
    assert_eq!(installments[1].status, InstallmentStatus::Overdue);
    assert_eq!(installments[2].status, InstallmentStatus::Pending);

    // A second run finds nothing new
    let again = sweep.run_for(date(2030, 3, 1)).await.unwrap().unwrap();
    assert_eq!(again.installments_marked_overdue, 0);
}

#[tokio::test]
async fn test_unpaid_receivable_past_due_becomes_overdue() {
    let app = helpers::test_app();
    let created = monthly_receivable(&app, "V-401", dec!(300.00)).await;
    let sweep = app.services.overdue_sweep(Duration::from_secs(3600));

    let report = sweep.run_for(date(2030, 4, 1)).await.unwrap().unwrap();
    assert_eq!(report.installments_marked_overdue, 3);
    assert_eq!(report.receivables_updated, 1);

    let receivable = app.services.receivables.get(&created.receivable.id).await.unwrap();
    assert_eq!(receivable.status, ReceivableStatus::Overdue);

    let summary = app
        .services
        .receivables
        .summary(&created.receivable.id)
        .await
        .unwrap();
    assert_eq!(summary.overdue_installments, 3);
}

#[tokio::test]
async fn test_paid_and_partial_receivables_keep_their_status() {
    let app = helpers::test_app();
    let paid = monthly_receivable(&app, "V-402", dec!(90.00)).await;
    let partial = monthly_receivable(&app, "V-403", dec!(90.00)).await;

    pay(&app, "V-402", dec!(90.00)).await;
    pay(&app, "V-403", dec!(45.00)).await;

    let sweep = app.services.overdue_sweep(Duration::from_secs(3600));
    let report = sweep.run_for(date(2030, 4, 1)).await.unwrap().unwrap();
    assert_eq!(report.receivables_updated, 0);

    let paid = app.services.receivables.get(&paid.receivable.id).await.unwrap();
    assert_eq!(paid.status, ReceivableStatus::Paid);

    let partial_receivable = app.services.receivables.get(&partial.receivable.id).await.unwrap();
    assert_eq!(partial_receivable.status, ReceivableStatus::Partial);

    // The partially covered installment still owes and is now overdue
    let installments = app
        .services
        .installments
        .list(&partial.receivable.id)
        .await
        .unwrap();
    assert_eq!(installments[0].status, InstallmentStatus::Paid);
    assert_eq!(installments[1].status, InstallmentStatus::Overdue);
    assert_eq!(installments[1].amount, dec!(15.00));
    assert_eq!(installments[2].status, InstallmentStatus::Overdue);
}

#[tokio::test]
async fn test_run_once_uses_business_date() {
    let app = helpers::test_app();
    monthly_receivable(&app, "V-404", dec!(60.00)).await;

    let report = app
        .services
        .overdue_sweep(Duration::from_secs(3600))
        .run_once()
        .await
        .unwrap()
        .unwrap();

    // Installments fall due in 2030
    assert_eq!(report.installments_marked_overdue, 0);
    assert_eq!(report.receivables_updated, 0);
}
