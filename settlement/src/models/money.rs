// settlement/src/models/money.rs

//! Conversion between decimal currency units and the gateway's minor units.
//!
//! Amounts inside the pipeline are `rust_decimal::Decimal`; only the gateway
//! boundary sees integers.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Digits between the major and minor unit (kobo, cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoneyError {
  #[error("amount must be positive, got {0}")]
  NotPositive(Decimal),

  #[error("amount {0} does not fit in minor units")]
  Overflow(Decimal),
}

/// Converts `amount` to minor units, rounding half-up on the minor-unit boundary.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
  if amount <= Decimal::ZERO {
    return Err(MoneyError::NotPositive(amount));
  }
  let rounded = amount.round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero);
  let minor = rounded
    .checked_mul(Decimal::from(10_i64.pow(MINOR_UNIT_SCALE)))
    .ok_or(MoneyError::Overflow(amount))?;
  let minor = minor.to_i64().ok_or(MoneyError::Overflow(amount))?;
  if minor <= 0 {
    // 0.004 rounds to zero minor units
    return Err(MoneyError::NotPositive(amount));
  }
  Ok(minor)
}

/// Converts a minor-unit integer back to a decimal with the currency's scale.
pub fn from_minor_units(minor: i64) -> Decimal {
  Decimal::new(minor, MINOR_UNIT_SCALE)
}

/// Renders an amount for humans, e.g. in notification text.
pub fn display_amount(amount: Decimal, currency: &str) -> String {
  format!("{} {:.2}", currency, amount)
}

#[cfg(test)]
mod tests {
  use super::*;
  use rust_decimal_macros::dec;

  #[test]
  fn converts_whole_and_fractional_amounts() {
    assert_eq!(to_minor_units(dec!(15000)).unwrap(), 1_500_000);
    assert_eq!(to_minor_units(dec!(12.34)).unwrap(), 1234);
    assert_eq!(to_minor_units(dec!(0.01)).unwrap(), 1);
  }

  #[test]
  fn rounds_half_up_on_the_minor_unit() {
    assert_eq!(to_minor_units(dec!(10.005)).unwrap(), 1001);
    assert_eq!(to_minor_units(dec!(10.004)).unwrap(), 1000);
    assert_eq!(to_minor_units(dec!(0.125)).unwrap(), 13);
  }

  #[test]
  fn rejects_non_positive_amounts() {
    assert_eq!(to_minor_units(dec!(0)), Err(MoneyError::NotPositive(dec!(0))));
    assert!(to_minor_units(dec!(-5.00)).is_err());
    assert!(to_minor_units(dec!(0.004)).is_err());
  }

  #[test]
  fn minor_units_come_back_with_currency_scale() {
    let amount = from_minor_units(1_500_000);
    assert_eq!(amount, dec!(15000.00));
    assert_eq!(amount.scale(), 2);
    assert_eq!(display_amount(amount, "NGN"), "NGN 15000.00");
  }
}
