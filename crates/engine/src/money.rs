use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError};

/// Signed money amount backed by a fixed-point decimal.
///
/// Use this type for **all** monetary values in the engine (unit prices,
/// line amounts, deductions) to avoid binary floating-point drift.
/// Intermediate results keep full precision; rounding to the currency's
/// minor units happens through [`Money::round`].
///
/// # Examples
///
/// ```rust
/// use remit_engine::{Currency, Money, Rounding};
///
/// let amount: Money = "1234.565".parse().unwrap();
/// assert_eq!(amount.round(Currency::Ngn, Rounding::HalfUp).to_string(), "1234.57");
/// assert_eq!(amount.round(Currency::Ngn, Rounding::Bankers).to_string(), "1234.56");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Creates a new amount from a decimal value in major units.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Returns the raw decimal value.
    #[must_use]
    pub const fn amount(self) -> Decimal {
        self.0
    }

    /// Returns `true` if the amount is 0.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Returns `true` if the amount is strictly positive.
    #[must_use]
    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Returns `true` if the amount is strictly negative.
    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// Adds two amounts, returning `None` on overflow.
    #[must_use]
    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Money)
    }

    /// Subtracts two amounts, returning `None` on overflow.
    #[must_use]
    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Money)
    }

    /// Multiplies the amount by a plain factor (days, kilometres).
    #[must_use]
    pub fn checked_times(self, factor: Decimal) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }

    /// `self × rate / 100`.
    #[must_use]
    pub fn checked_percent(self, rate: Rate) -> Option<Money> {
        self.0
            .checked_mul(rate.0)
            .and_then(|v| v.checked_div(Decimal::ONE_HUNDRED))
            .map(Money)
    }

    /// Portion of a tax-inclusive amount that is tax: `self × rate / (100 + rate)`.
    ///
    /// A rate of `-100` has no inclusive portion and yields zero.
    #[must_use]
    pub fn checked_inclusive_portion(self, rate: Rate) -> Option<Money> {
        let divisor = Decimal::ONE_HUNDRED.checked_add(rate.0)?;
        if divisor.is_zero() {
            return Some(Money::ZERO);
        }
        self.0
            .checked_mul(rate.0)
            .and_then(|v| v.checked_div(divisor))
            .map(Money)
    }

    /// Sum of `amounts`, or `None` if any partial sum overflows.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }

    /// Strips trailing zeros, so `1000.00` and `1000` share one representation.
    #[must_use]
    pub fn normalize(self) -> Money {
        Money(self.0.normalize())
    }

    /// Rounds to the currency's minor units with the given strategy.
    #[must_use]
    pub fn round(self, currency: Currency, rounding: Rounding) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(currency.minor_units(), rounding.strategy()),
        )
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl From<Decimal> for Money {
    fn from(value: Decimal) -> Self {
        Self(value)
    }
}

impl From<Money> for Decimal {
    fn from(value: Money) -> Self {
        value.0
    }
}

impl FromStr for Money {
    type Err = EngineError;

    /// Parses a decimal string in major units.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_decimal(s).map(Money)
    }
}

/// Percentage rate of a journal rule (`7.5` means 7.5%).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rate(Decimal);

impl Rate {
    pub const ZERO: Rate = Rate(Decimal::ZERO);

    #[must_use]
    pub const fn new(percent: Decimal) -> Self {
        Self(percent)
    }

    #[must_use]
    pub const fn value(self) -> Decimal {
        self.0
    }

    /// The rate read as a flat amount, used by `fixed` rate types.
    #[must_use]
    pub fn as_money(self) -> Money {
        Money(self.0)
    }
}

impl FromStr for Rate {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_decimal(s.trim().trim_end_matches('%')).map(Rate)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0.normalize())
    }
}

/// Rounding applied when a rule's computed amount is materialized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Midpoint rounds away from zero.
    #[default]
    HalfUp,
    /// Midpoint rounds to the even neighbour.
    Bankers,
}

impl Rounding {
    fn strategy(self) -> RoundingStrategy {
        match self {
            Self::HalfUp => RoundingStrategy::MidpointAwayFromZero,
            Self::Bankers => RoundingStrategy::MidpointNearestEven,
        }
    }
}

fn parse_decimal(s: &str) -> Result<Decimal, EngineError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidAmount("empty amount".to_string()));
    }
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let normalized = unsigned.replace(',', ".");
    if normalized.matches('.').count() > 1 {
        return Err(EngineError::InvalidAmount(format!("invalid amount: {s}")));
    }
    Decimal::from_str(&normalized)
        .map_err(|_| EngineError::InvalidAmount(format!("invalid amount: {s}")))
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_accepts_dot_or_comma() {
        assert_eq!("10".parse::<Money>().unwrap().amount(), dec!(10));
        assert_eq!("10,5".parse::<Money>().unwrap().amount(), dec!(10.5));
        assert_eq!("-0.01".parse::<Money>().unwrap().amount(), dec!(-0.01));
        assert_eq!("+1.00".parse::<Money>().unwrap().amount(), dec!(1));
        assert!("".parse::<Money>().is_err());
        assert!("1.2.3".parse::<Money>().is_err());
        assert!("abc".parse::<Money>().is_err());
    }

    #[test]
    fn rate_parse_tolerates_percent_sign() {
        assert_eq!("7.5%".parse::<Rate>().unwrap().value(), dec!(7.5));
        assert_eq!(Rate::new(dec!(15)).to_string(), "15%");
    }

    #[test]
    fn inclusive_portion_backs_out_vat() {
        let taxable = Money::new(dec!(11500));
        let vat = taxable.checked_inclusive_portion(Rate::new(dec!(15))).unwrap();
        assert_eq!(vat, Money::new(dec!(1500)));
        assert_eq!(taxable.checked_sub(vat), Some(Money::new(dec!(10000))));
    }

    #[test]
    fn rounding_modes_differ_on_midpoint() {
        let m = Money::new(dec!(2.345));
        assert_eq!(m.round(Currency::Ngn, Rounding::HalfUp), Money::new(dec!(2.35)));
        assert_eq!(m.round(Currency::Ngn, Rounding::Bankers), Money::new(dec!(2.34)));
    }

    #[test]
    fn percent_of_amount() {
        let base = Money::new(dec!(10000));
        assert_eq!(base.checked_percent(Rate::new(dec!(5))), Some(Money::new(dec!(500))));
        assert_eq!(base.checked_percent(Rate::new(dec!(7.5))), Some(Money::new(dec!(750))));
    }

    #[test]
    fn arithmetic_reports_overflow() {
        let huge = Money::new(Decimal::MAX);
        assert_eq!(huge.checked_add(Money::new(dec!(1))), None);
        assert_eq!(Money::new(Decimal::MIN).checked_sub(Money::new(dec!(1))), None);
        let (amount, km) = (Decimal::from(10u64.pow(16)), Decimal::from(10u64.pow(14)));
        assert_eq!(Money::new(amount).checked_times(km), None);
        assert_eq!(huge.checked_percent(Rate::new(dec!(15))), None);
        assert_eq!(huge.checked_inclusive_portion(Rate::new(dec!(15))), None);
        assert_eq!(Money::checked_sum([huge, huge]), None);
        assert_eq!(
            Money::checked_sum([Money::new(dec!(1.5)), Money::new(dec!(2))]),
            Some(Money::new(dec!(3.5)))
        );
    }

    #[test]
    fn normalize_drops_trailing_zeros() {
        let scaled = Money::new(dec!(1000.00));
        assert_eq!(scaled.amount().scale(), 2);
        assert_eq!(scaled.normalize().amount().scale(), 0);
        assert_eq!(
            serde_json::to_string(&scaled.normalize()).unwrap(),
            serde_json::to_string(&Money::new(dec!(1000))).unwrap()
        );
    }
}
