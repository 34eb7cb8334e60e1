use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places carried by every stored amount
pub const MONEY_SCALE: u32 = 2;

/// Smallest amount a customer may pay against an open installment (0.10)
pub fn minimum_payable() -> Decimal {
    Decimal::new(10, 2)
}

/// Rounds an amount to two decimal places, half away from zero.
///
/// `0.005` becomes `0.01` and `-0.005` becomes `-0.01`, matching how the
/// back-office has always rounded installment amounts. This differs from the
/// `Decimal::round_dp` default, which is banker's rounding.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Splits `total` into `parts` amounts of two decimals.
///
/// The first `parts - 1` entries carry `round2(total / parts)` and the last
/// absorbs the remainder, so the entries always sum to `total` exactly.
///
/// # Returns
/// `None` when `parts` is zero.
pub fn split_evenly(total: Decimal, parts: u32) -> Option<Vec<Decimal>> {
    if parts == 0 {
        return None;
    }

    let per_part = round2(total / Decimal::from(parts));
    let mut amounts = vec![per_part; parts as usize];

    let leading = per_part * Decimal::from(parts - 1);
    if let Some(last) = amounts.last_mut() {
        *last = total - leading;
    }

    Some(amounts)
}

/// Whether the amount has no more than two decimal places
pub fn has_money_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

/// Percentage of `part` over `whole`, rounded to two decimals. Zero when `whole` is zero.
pub fn percentage(part: Decimal, whole: Decimal) -> Decimal {
    if whole.is_zero() {
        return Decimal::ZERO;
    }
    round2(part / whole * Decimal::ONE_HUNDRED)
}
