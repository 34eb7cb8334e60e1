// Property-based tests for installment schedule generation

use chrono::NaiveDate;
use cobranza::core::AppError;
use cobranza::installments::services::{build_schedule, SpacingPolicy, MAX_INSTALLMENTS};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
}

fn biweekly() -> SpacingPolicy {
    SpacingPolicy::Biweekly { from: start() }
}

/// Amounts in cents, 1.00 to 100000.00
fn total_strategy() -> impl Strategy<Value = Decimal> {
    (100i64..=10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

#[test]
fn test_even_split_example() {
    let lines = build_schedule(dec!(100.00), 3, None, biweekly()).unwrap();
    let amounts: Vec<Decimal> = lines.iter().map(|l| l.amount).collect();

    assert_eq!(amounts, vec![dec!(33.33), dec!(33.33), dec!(33.34)]);
}

#[test]
fn test_custom_first_amount_example() {
    let lines = build_schedule(dec!(100.00), 3, Some(dec!(40.00)), biweekly()).unwrap();
    let amounts: Vec<Decimal> = lines.iter().map(|l| l.amount).collect();

    assert_eq!(amounts, vec![dec!(40.00), dec!(30.00), dec!(30.00)]);
}

#[test]
fn test_count_bounds() {
    assert!(matches!(
        build_schedule(dec!(100.00), 0, None, biweekly()),
        Err(AppError::InvalidSchedule(_))
    ));
    assert!(matches!(
        build_schedule(dec!(100.00), MAX_INSTALLMENTS + 1, None, biweekly()),
        Err(AppError::InvalidSchedule(_))
    ));
    assert_eq!(
        build_schedule(dec!(100.00), MAX_INSTALLMENTS, None, biweekly())
            .unwrap()
            .len(),
        MAX_INSTALLMENTS as usize
    );
}

#[test]
fn test_custom_first_amount_must_be_below_total() {
    for first in [dec!(0.00), dec!(-5.00), dec!(100.00), dec!(150.00)] {
        assert!(
            matches!(
                build_schedule(dec!(100.00), 3, Some(first), biweekly()),
                Err(AppError::InvalidSchedule(_))
            ),
            "first amount {} should be rejected",
            first
        );
    }
}

#[test]
fn test_monthly_due_dates_clamp_to_month_end() {
    let lines = build_schedule(
        dec!(90.00),
        3,
        None,
        SpacingPolicy::Monthly { first_due: start() },
    )
    .unwrap();

    assert_eq!(lines[0].due_date, start());
    assert_eq!(lines[1].due_date, NaiveDate::from_ymd_opt(2025, 2, 28).unwrap());
    assert_eq!(lines[2].due_date, NaiveDate::from_ymd_opt(2025, 3, 31).unwrap());
}

#[test]
fn test_biweekly_due_dates_every_fifteen_days() {
    let lines = build_schedule(dec!(90.00), 3, None, biweekly()).unwrap();

    assert_eq!(lines[0].due_date, NaiveDate::from_ymd_opt(2025, 2, 15).unwrap());
    assert_eq!(lines[1].due_date, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
    assert_eq!(lines[2].due_date, NaiveDate::from_ymd_opt(2025, 3, 17).unwrap());
}

proptest! {
    #[test]
    fn prop_even_split_sums_to_total(total in total_strategy(), count in 1u32..=MAX_INSTALLMENTS) {
        let lines = build_schedule(total, count, None, biweekly()).unwrap();

        prop_assert_eq!(lines.len(), count as usize);
        prop_assert_eq!(lines.iter().map(|l| l.amount).sum::<Decimal>(), total);

        for (index, line) in lines.iter().enumerate() {
            prop_assert_eq!(line.sequence_number, index as i32 + 1);
            prop_assert!(line.amount > Decimal::ZERO);
            prop_assert!(line.amount.scale() <= 2);
        }
    }

    #[test]
    fn prop_custom_first_sums_to_total(
        total in total_strategy(),
        count in 2u32..=MAX_INSTALLMENTS,
        share in 1u32..100,
    ) {
        let first = (total * Decimal::from(share) / Decimal::from(100)).round_dp(2);
        prop_assume!(first > Decimal::ZERO && first < total);
        // leave at least 0.10 per installment so rounding cannot zero the last one
        prop_assume!(total - first >= Decimal::new(i64::from(count) * 10, 2));

        let lines = build_schedule(total, count, Some(first), biweekly()).unwrap();

        prop_assert_eq!(lines[0].amount, first);
        prop_assert_eq!(lines.iter().map(|l| l.amount).sum::<Decimal>(), total);
    }

    #[test]
    fn prop_custom_first_monthly_dates_increase(count in 2u32..=MAX_INSTALLMENTS, day in 1u32..=28) {
        let first_due = NaiveDate::from_ymd_opt(2025, 1, day).unwrap();
        let lines = build_schedule(
            dec!(1200.00),
            count,
            Some(dec!(100.00)),
            SpacingPolicy::Monthly { first_due },
        )
        .unwrap();

        prop_assert_eq!(lines[0].due_date, first_due + chrono::Days::new(15));
        for pair in lines.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
        }
    }

    #[test]
    fn prop_due_dates_strictly_increase(total in total_strategy(), count in 2u32..=MAX_INSTALLMENTS) {
        for spacing in [biweekly(), SpacingPolicy::Monthly { first_due: start() }] {
            let lines = build_schedule(total, count, None, spacing).unwrap();
            for pair in lines.windows(2) {
                prop_assert!(pair[0].due_date < pair[1].due_date);
            }
        }
    }
}
