//! Money bounds and overflow-checked arithmetic.
//!
//! Amounts carry at most two decimal places. Prices, budgets and expenses
//! fit in 10 digits; balances, trade totals and goals in 12.

use rust_decimal::Decimal;

use super::error::PaisaError;

pub const MONEY_SCALE: u32 = 2;
pub const AMOUNT_DIGITS: u32 = 10;
pub const BALANCE_DIGITS: u32 = 12;

/// Reject amounts with more than two decimal places or more than
/// `max_digits` digits in total.
pub fn check_money(field: &str, value: Decimal, max_digits: u32) -> Result<(), PaisaError> {
    if value.normalize().scale() > MONEY_SCALE {
        return Err(PaisaError::validation(
            field,
            format!("must have at most {MONEY_SCALE} decimal places"),
        ));
    }
    let limit = Decimal::from(10_i64.pow(max_digits - MONEY_SCALE));
    if value.abs() >= limit {
        return Err(PaisaError::validation(
            field,
            format!("must be less than {limit}"),
        ));
    }
    Ok(())
}

fn out_of_range() -> PaisaError {
    PaisaError::InvalidAmount {
        reason: "amount is out of range".into(),
    }
}

pub fn add(a: Decimal, b: Decimal) -> Result<Decimal, PaisaError> {
    a.checked_add(b).ok_or_else(out_of_range)
}

pub fn sub(a: Decimal, b: Decimal) -> Result<Decimal, PaisaError> {
    a.checked_sub(b).ok_or_else(out_of_range)
}

pub fn mul(a: Decimal, b: Decimal) -> Result<Decimal, PaisaError> {
    a.checked_mul(b).ok_or_else(out_of_range)
}

pub fn div(a: Decimal, b: Decimal) -> Result<Decimal, PaisaError> {
    a.checked_div(b).ok_or_else(out_of_range)
}

pub fn sum<I>(values: I) -> Result<Decimal, PaisaError>
where
    I: IntoIterator<Item = Decimal>,
{
    values.into_iter().try_fold(Decimal::ZERO, add)
}

/// `part / whole × 100` to two places, 0 when `whole` is not positive.
pub fn percent(part: Decimal, whole: Decimal) -> Result<Decimal, PaisaError> {
    if whole <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    Ok(mul(div(part, whole)?, Decimal::ONE_HUNDRED)?.round_dp(2))
}
