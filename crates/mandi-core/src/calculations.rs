//! Trade pricing: total amount, mandi cess, and the final payable amount.
//!
//! Every monetary result is rounded half-up to two decimal places. Inputs may
//! be given as [`Decimal`] or as plain numbers; floats are read through their
//! shortest decimal form so `2.675_f64` prices exactly like `dec!(2.675)`.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ValidationError;

const CURRENCY_SCALE: u32 = 2;

/// 5% mandi cess.
pub fn mandi_cess_rate() -> Decimal {
    Decimal::new(5, 2)
}

/// Largest difference still treated as a match by
/// [`validate_calculation_consistency`].
pub fn consistency_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Numeric input accepted by the calculation functions.
pub trait IntoAmount {
    fn into_amount(self, field: &'static str) -> Result<Decimal, ValidationError>;
}

impl IntoAmount for Decimal {
    fn into_amount(self, _field: &'static str) -> Result<Decimal, ValidationError> {
        Ok(self)
    }
}

impl IntoAmount for &Decimal {
    fn into_amount(self, _field: &'static str) -> Result<Decimal, ValidationError> {
        Ok(*self)
    }
}

impl IntoAmount for f64 {
    fn into_amount(self, field: &'static str) -> Result<Decimal, ValidationError> {
        if !self.is_finite() {
            return Err(ValidationError::out_of_range(field, "must be a finite number"));
        }

        Decimal::from_str(&self.to_string())
            .map_err(|err| ValidationError::out_of_range(field, err.to_string()))
    }
}

impl IntoAmount for i64 {
    fn into_amount(self, _field: &'static str) -> Result<Decimal, ValidationError> {
        Ok(Decimal::from(self))
    }
}

impl IntoAmount for u32 {
    fn into_amount(self, _field: &'static str) -> Result<Decimal, ValidationError> {
        Ok(Decimal::from(self))
    }
}

/// Rounds half-up to two decimal places and pins the scale at two, so
/// `1000` is carried as `1000.00`.
pub fn round_currency(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(CURRENCY_SCALE);
    rounded
}

pub fn calculate_total_amount(
    quantity: impl IntoAmount,
    unit_price: impl IntoAmount,
) -> Result<Decimal, ValidationError> {
    let quantity = quantity.into_amount("quantity")?;
    let unit_price = unit_price.into_amount("unit_price")?;

    if quantity <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity);
    }
    if unit_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveUnitPrice);
    }

    let total = quantity.checked_mul(unit_price).ok_or_else(|| {
        ValidationError::out_of_range("total_amount", "quantity × unit_price overflows")
    })?;

    Ok(round_currency(total))
}

pub fn calculate_mandi_cess(total_amount: impl IntoAmount) -> Result<Decimal, ValidationError> {
    let total_amount = total_amount.into_amount("total_amount")?;

    if total_amount < Decimal::ZERO {
        return Err(ValidationError::NegativeTotalAmount);
    }

    let cess = total_amount
        .checked_mul(mandi_cess_rate())
        .ok_or_else(|| ValidationError::out_of_range("mandi_cess", "total_amount overflows"))?;

    Ok(round_currency(cess))
}

/// Returns `(total_amount, mandi_cess, final_amount)`.
pub fn calculate_final_amount(
    quantity: impl IntoAmount,
    unit_price: impl IntoAmount,
) -> Result<(Decimal, Decimal, Decimal), ValidationError> {
    let total_amount = calculate_total_amount(quantity, unit_price)?;
    let mandi_cess = calculate_mandi_cess(total_amount)?;
    let final_amount = total_amount
        .checked_add(mandi_cess)
        .ok_or_else(|| ValidationError::out_of_range("final_amount", "total + cess overflows"))?;

    Ok((total_amount, mandi_cess, final_amount))
}

/// Recomputes total and cess and reports whether the given pair matches.
/// Invalid inputs simply yield `false`.
pub fn validate_calculation_consistency(
    quantity: impl IntoAmount,
    unit_price: impl IntoAmount,
    total_amount: impl IntoAmount,
    mandi_cess: impl IntoAmount,
) -> bool {
    let (Ok(total_amount), Ok(mandi_cess)) = (
        total_amount.into_amount("total_amount"),
        mandi_cess.into_amount("mandi_cess"),
    ) else {
        return false;
    };
    let Ok(expected_total) = calculate_total_amount(quantity, unit_price) else {
        return false;
    };
    let Ok(expected_cess) = calculate_mandi_cess(expected_total) else {
        return false;
    };

    within_tolerance(total_amount, expected_total) && within_tolerance(mandi_cess, expected_cess)
}

/// `|actual - expected| < 0.01`; a difference too large to represent is
/// never within tolerance.
pub(crate) fn within_tolerance(actual: Decimal, expected: Decimal) -> bool {
    actual
        .checked_sub(expected)
        .is_some_and(|diff| diff.abs() < consistency_tolerance())
}
