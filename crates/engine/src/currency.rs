use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO currency code attached to money values and transaction lines.
///
/// ## Minor units
///
/// Amounts are computed as decimals and rounded to the currency's minor
/// units only when a line is produced. `minor_units()` returns how many
/// fraction digits survive that rounding.
///
/// Example: NGN has 2 minor units (kobo), so `1234.565 NGN` rounds half-up to
/// `1234.57`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Ngn,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Currency::Ngn => "NGN",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    /// Number of fraction digits kept when rounding amounts.
    #[must_use]
    pub const fn minor_units(self) -> u32 {
        match self {
            Currency::Ngn | Currency::Usd | Currency::Eur | Currency::Gbp => 2,
        }
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "NGN" => Ok(Currency::Ngn),
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            other => Err(EngineError::UnsupportedCurrency(other.to_string())),
        }
    }
}
