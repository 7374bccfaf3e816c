//! Type-safe price representation using decimal arithmetic.

use core::fmt;
use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a price from user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The input is not a decimal number.
    #[error("price must be a number")]
    NotANumber,
    /// The input is below zero.
    #[error("price cannot be negative")]
    Negative,
    /// The amount exceeds [`MAX_AMOUNT`] or the processor's integer minor units.
    #[error("price is too large")]
    TooLarge,
}

/// Largest storable amount, matching the `NUMERIC(12, 2)` price column.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    INR,
}

impl CurrencyCode {
    /// Display symbol for amounts in this currency.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
            Self::INR => "₹",
        }
    }

    /// Lower-case code as expected by the payment processor.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::INR => "inr",
        }
    }
}

impl FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::USD),
            "eur" => Ok(Self::EUR),
            "gbp" => Ok(Self::GBP),
            "inr" => Ok(Self::INR),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

/// A price with currency information.
///
/// The amount is in the currency's standard unit (rupees, dollars), stored
/// with two decimal places.
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

    /// Parse a non-negative amount from a form field, rounded to cents.
    ///
    /// # Errors
    ///
    /// Returns [`PriceError`] when the input is not a number, is negative, or
    /// is above [`MAX_AMOUNT`].
    ///
    /// ```
    /// use bazaar_core::Price;
    /// use rust_decimal::Decimal;
    ///
    /// assert_eq!(Price::parse_amount("12.999").unwrap(), Decimal::new(1300, 2));
    /// assert!(Price::parse_amount("twelve").is_err());
    /// ```
    pub fn parse_amount(input: &str) -> Result<Decimal, PriceError> {
        let trimmed = input.trim();
        let amount = Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| PriceError::NotANumber)?;

        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(PriceError::Negative);
        }

        let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if rounded > MAX_AMOUNT {
            return Err(PriceError::TooLarge);
        }
        Ok(rounded)
    }

    /// Amount in the smallest currency unit, rounded up (paise, cents).
    ///
    /// # Errors
    ///
    /// Returns [`PriceError::TooLarge`] if the amount does not fit an `i64`.
    pub fn minor_units(&self) -> Result<i64, PriceError> {
        use rust_decimal::prelude::ToPrimitive;

        (self.amount * Decimal::ONE_HUNDRED)
            .ceil()
            .to_i64()
            .ok_or(PriceError::TooLarge)
    }

    /// Multiply by a line quantity.
    #[must_use]
    pub fn times(&self, quantity: u32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        write!(f, "{}{:.2}", self.currency_code.symbol(), rounded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_amount_accepts_floats() {
        assert_eq!(Price::parse_amount("19.99").unwrap(), Decimal::new(1999, 2));
        assert_eq!(Price::parse_amount(" 5 ").unwrap(), Decimal::new(5, 0));
        assert_eq!(Price::parse_amount("0").unwrap(), Decimal::ZERO);
        assert_eq!(Price::parse_amount("1e2").unwrap(), Decimal::new(100, 0));
    }

    #[test]
    fn test_parse_amount_rejects_bad_input() {
        assert_eq!(Price::parse_amount(""), Err(PriceError::NotANumber));
        assert_eq!(Price::parse_amount("abc"), Err(PriceError::NotANumber));
        assert_eq!(Price::parse_amount("-1.50"), Err(PriceError::Negative));
    }

    #[test]
    fn test_parse_amount_rejects_amounts_above_column_range() {
        assert_eq!(MAX_AMOUNT, Decimal::new(999_999_999_999, 2));
        assert_eq!(
            Price::parse_amount("9999999999.99").unwrap(),
            Decimal::new(999_999_999_999, 2)
        );
        assert_eq!(Price::parse_amount("99999999999"), Err(PriceError::TooLarge));
        // Rounds up past the limit
        assert_eq!(Price::parse_amount("9999999999.995"), Err(PriceError::TooLarge));
    }

    #[test]
    fn test_minor_units_round_up() {
        let price = Price::new(Decimal::new(1999, 2), CurrencyCode::INR);
        assert_eq!(price.minor_units().unwrap(), 1999);

        let fractional = Price::new(Decimal::new(10_001, 3), CurrencyCode::INR);
        assert_eq!(fractional.minor_units().unwrap(), 1001);
    }

    #[test]
    fn test_display_and_times() {
        let price = Price::new(Decimal::new(1250, 2), CurrencyCode::USD);
        assert_eq!(price.to_string(), "$12.50");
        assert_eq!(price.times(3).to_string(), "$37.50");

        let rupees = Price::new(Decimal::new(99, 0), CurrencyCode::INR);
        assert_eq!(rupees.to_string(), "₹99.00");
    }

    #[test]
    fn test_currency_from_str() {
        assert_eq!("INR".parse::<CurrencyCode>().unwrap(), CurrencyCode::INR);
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert!("btc".parse::<CurrencyCode>().is_err());
    }
}
