// Integration tests for receivable creation and schedule generation

#[path = "../helpers/mod.rs"]
mod helpers;

use chrono::{Days, NaiveDate};
use cobranza::core::traits::LedgerStore;
use cobranza::core::AppError;
use cobranza::installments::ScheduleRequest;
use cobranza::payments::{ManualPayment, PaymentMethod};
use cobranza::receivables::services::CreateReceivableRequest;
use cobranza::receivables::ReceivableStatus;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn schedule(count: u32) -> ScheduleRequest {
    ScheduleRequest {
        count,
        first_installment_amount: None,
        first_due: None,
    }
}

#[tokio::test]
async fn test_create_with_schedule() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-300", dec!(100.00), 3).await;

    assert_eq!(created.receivable.status, ReceivableStatus::Pending);
    assert_eq!(created.receivable.outstanding_amount, dec!(100.00));

    let amounts: Vec<Decimal> = created.installments.iter().map(|i| i.amount).collect();
    assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
    assert_eq!(
        created.installments[0].due_date,
        app.today().checked_add_days(Days::new(15)).unwrap()
    );

    let summary = app
        .services
        .receivables
        .summary(&created.receivable.id)
        .await
        .unwrap();
    assert_eq!(summary.installment_count, 3);
    assert_eq!(summary.pending_installments, 3);
    assert_eq!(summary.percentage_paid, Decimal::ZERO);

    let next = app
        .services
        .receivables
        .next_payment(&created.receivable.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(next.sequence_number, 1);
    assert_eq!(next.days_remaining, 15);
    assert!(!next.is_overdue);
}

#[tokio::test]
async fn test_regenerate_before_any_payment() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-301", dec!(120.00), 3).await;

    let first_due = NaiveDate::from_ymd_opt(2031, 1, 31).unwrap();
    let regenerated = app
        .services
        .installments
        .generate_schedule(
            &created.receivable.id,
            &ScheduleRequest {
                count: 4,
                first_installment_amount: None,
                first_due: Some(first_due),
            },
        )
        .await
        .unwrap();

    assert_eq!(regenerated.len(), 4);
    assert_eq!(regenerated[0].due_date, first_due);
    assert_eq!(regenerated[1].due_date, NaiveDate::from_ymd_opt(2031, 2, 28).unwrap());

    let stored = app
        .services
        .installments
        .list(&created.receivable.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 4);
    assert!(stored.iter().all(|i| i.amount == dec!(30.00)));
    assert!(stored
        .iter()
        .all(|i| created.installments.iter().all(|old| old.id != i.id)));
}

#[tokio::test]
async fn test_schedule_locked_after_payment() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-302", dec!(100.00), 2).await;

    app.services
        .payments
        .record_payment(ManualPayment {
            sale_ref: "V-302".to_string(),
            amount: dec!(10.00),
            paid_at: None,
            method: PaymentMethod::Transfer,
            reference: Some("TRX-77".to_string()),
            recorded_by: "cajero-2".to_string(),
            notes: None,
        })
        .await
        .unwrap();

    let result = app
        .services
        .installments
        .generate_schedule(&created.receivable.id, &schedule(4))
        .await;
    assert!(matches!(result, Err(AppError::ScheduleLocked(_))));

    let stored = app
        .services
        .installments
        .list(&created.receivable.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_custom_first_installment() {
    let app = helpers::test_app();

    let created = app
        .services
        .receivables
        .create(CreateReceivableRequest {
            sale_ref: "V-303".to_string(),
            total_amount: dec!(100.00),
            due_date: None,
            schedule: Some(ScheduleRequest {
                count: 3,
                first_installment_amount: Some(dec!(40.00)),
                first_due: None,
            }),
        })
        .await
        .unwrap();

    let amounts: Vec<Decimal> = created.installments.iter().map(|i| i.amount).collect();
    assert_eq!(amounts, vec![dec!(40.00), dec!(30.00), dec!(30.00)]);
}

#[tokio::test]
async fn test_invalid_schedule_aborts_creation() {
    let app = helpers::test_app();

    for count in [0, 13] {
        let result = app
            .services
            .receivables
            .create(CreateReceivableRequest {
                sale_ref: "V-304".to_string(),
                total_amount: dec!(100.00),
                due_date: None,
                schedule: Some(schedule(count)),
            })
            .await;
        assert!(matches!(result, Err(AppError::InvalidSchedule(_))));
    }

    assert!(app.store.find_receivable_by_sale("V-304").await.unwrap().is_none());
}

#[tokio::test]
async fn test_first_due_in_the_past_is_rejected() {
    let app = helpers::test_app();
    let created = helpers::open_receivable(&app, "V-307", dec!(90.00), 3).await;

    for first_due in [app.today(), app.today().checked_sub_days(Days::new(3)).unwrap()] {
        let result = app
            .services
            .installments
            .generate_schedule(
                &created.receivable.id,
                &ScheduleRequest {
                    count: 3,
                    first_installment_amount: None,
                    first_due: Some(first_due),
                },
            )
            .await;
        assert!(matches!(result, Err(AppError::InvalidSchedule(_))));
    }

    // The existing schedule is untouched
    let stored = app
        .services
        .installments
        .list(&created.receivable.id)
        .await
        .unwrap();
    assert_eq!(stored.len(), 3);
    assert_eq!(stored[0].id, created.installments[0].id);
}

#[tokio::test]
async fn test_one_receivable_per_sale() {
    let app = helpers::test_app();
    helpers::open_receivable(&app, "V-305", dec!(100.00), 1).await;

    let result = app
        .services
        .receivables
        .create(CreateReceivableRequest {
            sale_ref: "V-305".to_string(),
            total_amount: dec!(50.00),
            due_date: None,
            schedule: None,
        })
        .await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_create_with_past_due_date_starts_overdue() {
    let app = helpers::test_app();
    let yesterday = app.today().checked_sub_days(Days::new(1)).unwrap();

    let created = app
        .services
        .receivables
        .create(CreateReceivableRequest {
            sale_ref: "V-306".to_string(),
            total_amount: dec!(75.00),
            due_date: Some(yesterday),
            schedule: None,
        })
        .await
        .unwrap();

    assert_eq!(created.receivable.status, ReceivableStatus::Overdue);
    assert!(created.installments.is_empty());
}

#[tokio::test]
async fn test_unknown_receivable_is_not_found() {
    let app = helpers::test_app();

    let result = app
        .services
        .installments
        .generate_schedule("missing", &schedule(2))
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let summary = app.services.receivables.summary("missing").await;
    assert!(matches!(summary, Err(AppError::NotFound(_))));
}
