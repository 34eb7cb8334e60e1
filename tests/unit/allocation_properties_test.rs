// Property-based tests for payment allocation across installments

use chrono::NaiveDate;
use cobranza::core::AppError;
use cobranza::installments::models::{open_balance, Installment, InstallmentStatus};
use cobranza::installments::services::{apply_payment, build_schedule, SpacingPolicy};
use cobranza::receivables::models::Receivable;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 10).unwrap()
}

fn scheduled(total: Decimal, count: u32) -> (Receivable, Vec<Installment>) {
    let receivable = Receivable::new("V-ALLOC", total, None).unwrap();
    let installments = build_schedule(
        total,
        count,
        None,
        SpacingPolicy::Biweekly { from: today() },
    )
    .unwrap()
    .into_iter()
    .map(|line| Installment::new(&receivable.id, line.sequence_number, line.amount, line.due_date))
    .collect();
    (receivable, installments)
}

/// Replace every touched installment with its updated copy
fn merge(installments: &[Installment], touched: Vec<Installment>) -> Vec<Installment> {
    installments
        .iter()
        .map(|original| {
            touched
                .iter()
                .find(|t| t.id == original.id)
                .cloned()
                .unwrap_or_else(|| original.clone())
        })
        .collect()
}

#[test]
fn test_fifo_pays_first_and_reduces_second() {
    let (receivable, installments) = scheduled(dec!(150.00), 3);

    let result = apply_payment(&receivable, &installments, dec!(70.00), today()).unwrap();
    let after = merge(&installments, result.touched_installments());

    assert_eq!(after[0].status, InstallmentStatus::Paid);
    assert_eq!(after[0].paid_date, Some(today()));
    assert_eq!(after[1].status, InstallmentStatus::Pending);
    assert_eq!(after[1].amount, dec!(30.00));
    assert_eq!(after[2].amount, dec!(50.00));
    assert_eq!(open_balance(&after), dec!(80.00));
}

#[test]
fn test_full_outstanding_settles_every_installment() {
    let (receivable, installments) = scheduled(dec!(100.00), 3);

    let result = apply_payment(&receivable, &installments, dec!(100.00), today()).unwrap();

    assert!(result.settled);
    assert_eq!(result.paid_installments.len(), 3);
    assert_eq!(result.unallocated, Decimal::ZERO);
}

#[test]
fn test_amount_above_outstanding_is_rejected() {
    let (mut receivable, installments) = scheduled(dec!(100.00), 2);
    receivable.record_payment(dec!(60.00), today());

    let result = apply_payment(&receivable, &installments, dec!(40.01), today());
    assert!(matches!(result, Err(AppError::InvalidPaymentAmount(_))));
}

#[test]
fn test_sub_cent_amount_is_rejected() {
    let (receivable, installments) = scheduled(dec!(100.00), 2);

    let result = apply_payment(&receivable, &installments, dec!(10.005), today());
    assert!(matches!(result, Err(AppError::InvalidPaymentAmount(_))));
}

proptest! {
    #[test]
    fn prop_allocation_conserves_amount(
        total_cents in 100i64..=5_000_000,
        count in 1u32..=24,
        share in 1u32..=100,
    ) {
        let total = Decimal::new(total_cents, 2);
        let (receivable, installments) = scheduled(total, count);
        let amount = (total * Decimal::from(share) / Decimal::from(100)).round_dp(2);
        prop_assume!(amount > Decimal::ZERO);

        let result = apply_payment(&receivable, &installments, amount, today()).unwrap();

        let allocated: Decimal = result.allocations.iter().map(|a| a.amount).sum();
        prop_assert_eq!(allocated + result.unallocated, amount);
        prop_assert_eq!(result.remaining_outstanding, total - amount);
        prop_assert_eq!(result.settled, amount == total);
        prop_assert!(result.allocations.iter().all(|a| a.amount > Decimal::ZERO));
    }

    #[test]
    fn prop_open_balance_tracks_outstanding(
        total_cents in 100i64..=5_000_000,
        count in 1u32..=24,
        shares in proptest::collection::vec(1u32..=60, 1..5),
    ) {
        let total = Decimal::new(total_cents, 2);
        let (mut receivable, mut installments) = scheduled(total, count);

        for share in shares {
            let amount = (receivable.outstanding_amount * Decimal::from(share) / Decimal::from(100))
                .round_dp(2);
            if amount <= Decimal::ZERO {
                continue;
            }

            let result = apply_payment(&receivable, &installments, amount, today()).unwrap();
            installments = merge(&installments, result.touched_installments());
            receivable.record_payment(amount, today());

            prop_assert_eq!(open_balance(&installments), receivable.outstanding_amount);
        }
    }
}
