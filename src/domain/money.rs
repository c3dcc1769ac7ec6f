use crate::error::MarketplaceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A profile balance, stored with the two decimal places the ledger works in.
///
/// This is a wrapper around `rust_decimal::Decimal`. It may hold any value;
/// the rules about when it can decrease live on [`Profile`](super::profile::Profile).
/// Arithmetic is checked: running past the `Decimal` range is an
/// [`Overflow`](MarketplaceError::Overflow) error, never a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Balance(#[serde(with = "rust_decimal::serde::str")] pub Decimal);

/// A strictly positive monetary amount: a job price or a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, MarketplaceError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(MarketplaceError::validation(format!(
                "Amount must be positive, got {value}"
            )))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = MarketplaceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn checked_add(self, rhs: Self) -> Result<Self, MarketplaceError> {
        self.0
            .checked_add(rhs.0)
            .map(Self)
            .ok_or(MarketplaceError::Overflow("adding to a balance"))
    }

    pub fn checked_sub(self, rhs: Self) -> Result<Self, MarketplaceError> {
        self.0
            .checked_sub(rhs.0)
            .map(Self)
            .ok_or(MarketplaceError::Overflow("subtracting from a balance"))
    }

    /// Returns `percent`% of this balance.
    ///
    /// Near the top of the `Decimal` range the division happens first, which
    /// may round the last digits.
    pub fn percent(&self, percent: Decimal) -> Result<Self, MarketplaceError> {
        self.0
            .checked_mul(percent)
            .and_then(|scaled| scaled.checked_div(Decimal::ONE_HUNDRED))
            .or_else(|| {
                self.0
                    .checked_div(Decimal::ONE_HUNDRED)?
                    .checked_mul(percent)
            })
            .map(Self)
            .ok_or(MarketplaceError::Overflow("applying a percentage"))
    }

    /// Adds up a list of amounts.
    pub fn total<I>(amounts: I) -> Result<Self, MarketplaceError>
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Self::ZERO, |sum, amount| sum.checked_add(amount.into()))
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10.0));
        let b2 = Balance::new(dec!(5.0));
        assert_eq!(b1.checked_add(b2).unwrap(), Balance::new(dec!(15.0)));
        assert_eq!(b1.checked_sub(b2).unwrap(), Balance::new(dec!(5.0)));
    }

    #[test]
    fn test_balance_overflow_is_an_error() {
        let max = Balance::new(Decimal::MAX);
        assert!(matches!(
            max.checked_add(Balance::new(dec!(1))),
            Err(MarketplaceError::Overflow(_))
        ));
        assert!(matches!(
            Balance::new(Decimal::MIN).checked_sub(Balance::new(dec!(1))),
            Err(MarketplaceError::Overflow(_))
        ));

        let huge = [Decimal::MAX, dec!(1)]
            .into_iter()
            .map(|p| Amount::new(p).unwrap());
        assert!(matches!(
            Balance::total(huge),
            Err(MarketplaceError::Overflow(_))
        ));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(MarketplaceError::ValidationError(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(MarketplaceError::ValidationError(_))
        ));
    }

    #[test]
    fn test_balance_percent() {
        let total = Balance::new(dec!(402.00));
        assert_eq!(total.percent(dec!(25)).unwrap(), Balance::new(dec!(100.50)));
        assert_eq!(Balance::ZERO.percent(dec!(25)).unwrap(), Balance::ZERO);
    }

    #[test]
    fn test_balance_percent_of_the_largest_value() {
        let max = Balance::new(Decimal::MAX);
        let quarter = max.percent(dec!(25)).unwrap();
        assert!(quarter > Balance::ZERO && quarter < max);
        assert!(max.percent(dec!(100)).unwrap() <= max);
    }

    #[test]
    fn test_sum_of_amounts() {
        let prices = [dec!(200), dec!(121), dec!(0.50)]
            .into_iter()
            .map(|p| Amount::new(p).unwrap());
        assert_eq!(Balance::total(prices).unwrap(), Balance::new(dec!(321.50)));
    }

    #[test]
    fn test_amount_rejects_non_positive_on_deserialize() {
        assert!(serde_json::from_str::<Amount>("\"12.5\"").is_ok());
        assert!(serde_json::from_str::<Amount>("\"0\"").is_err());
    }
}
