//! Type-safe price representation using decimal arithmetic.

use core::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
///
/// Amounts are in the currency's standard unit (dollars, not cents). Plan
/// prices are whole numbers; charge amounts from Stripe arrive in cents and
/// are converted with [`Price::from_minor_units`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit.
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Create a whole-dollar USD price.
    #[must_use]
    pub fn usd(dollars: u32) -> Self {
        Self::new(Decimal::from(dollars), CurrencyCode::USD)
    }

    /// Create a price from an amount in minor units (e.g. Stripe cents).
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self::new(Decimal::new(minor, 2), currency_code)
    }

    /// Round to a whole unit, halves away from zero.
    #[must_use]
    pub fn round_whole(self) -> Self {
        Self::new(
            self.amount
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero),
            self.currency_code,
        )
    }

    /// Round up to the next whole unit.
    #[must_use]
    pub fn ceil_whole(self) -> Self {
        Self::new(self.amount.ceil(), self.currency_code)
    }

    /// Format for display, dropping the fraction for whole amounts
    /// (`$626`, `$12.50`).
    #[must_use]
    pub fn display(&self) -> String {
        let symbol = self.currency_code.symbol();
        if self.amount.fract().is_zero() {
            format!("{symbol}{}", self.amount.trunc())
        } else {
            format!(
                "{symbol}{:.2}",
                self.amount
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            )
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes accepted from the payments API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Look up a currency by its ISO code, ignoring case.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "usd" => Some(Self::USD),
            "eur" => Some(Self::EUR),
            "gbp" => Some(Self::GBP),
            "cad" => Some(Self::CAD),
            "aud" => Some(Self::AUD),
            _ => None,
        }
    }

    /// Display symbol for the currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_whole_and_fractional() {
        assert_eq!(Price::usd(626).display(), "$626");
        assert_eq!(
            Price::from_minor_units(1250, CurrencyCode::USD).display(),
            "$12.50"
        );
        assert_eq!(
            Price::from_minor_units(1999, CurrencyCode::GBP).display(),
            "£19.99"
        );
    }

    #[test]
    fn test_round_whole_half_away_from_zero() {
        let half = Price::new(Decimal::new(3745, 1), CurrencyCode::USD);
        assert_eq!(half.round_whole().amount, Decimal::from(375));
        let below = Price::new(Decimal::new(6256, 1), CurrencyCode::USD);
        assert_eq!(below.round_whole().amount, Decimal::from(626));
    }

    #[test]
    fn test_ceil_whole() {
        let price = Price::new(Decimal::new(3741, 1), CurrencyCode::USD);
        assert_eq!(price.ceil_whole().amount, Decimal::from(375));
    }

    #[test]
    fn test_currency_deserializes_lowercase() {
        let code: CurrencyCode = serde_json::from_str("\"eur\"").unwrap_or_default();
        assert_eq!(code, CurrencyCode::EUR);
        assert_eq!(CurrencyCode::from_code("GBP"), Some(CurrencyCode::GBP));
        assert_eq!(CurrencyCode::from_code("jpy"), None);
    }
}
