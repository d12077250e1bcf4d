use crate::utils::error::AppError;
use rocket_okapi::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::Display;

/// ISO-ish currency code. Only the four currencies the reservation core
/// actually prices flights in are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, JsonSchema, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum Currency {
    #[sqlx(rename = "EUR")]
    #[strum(serialize = "EUR")]
    Eur,
    #[sqlx(rename = "USD")]
    #[strum(serialize = "USD")]
    Usd,
    #[sqlx(rename = "GBP")]
    #[strum(serialize = "GBP")]
    Gbp,
    #[sqlx(rename = "CHF")]
    #[strum(serialize = "CHF")]
    Chf,
}

/// Money as integer minor units (cents) plus a currency tag.
///
/// Arithmetic across mismatched currencies fails with `CurrencyMismatch`
/// rather than silently truncating or converting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Money {
    pub amount_minor: i64,
    pub currency: Currency,
}

impl Money {
    pub fn new(amount_minor: i64, currency: Currency) -> Self {
        Money { amount_minor, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Money { amount_minor: 0, currency }
    }

    pub fn add(&self, other: &Money) -> Result<Money, AppError> {
        if self.currency != other.currency {
            return Err(AppError::CurrencyMismatch {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money::new(self.amount_minor + other.amount_minor, self.currency))
    }

    pub fn multiply(&self, factor: i64) -> Result<Money, AppError> {
        if factor < 0 {
            return Err(AppError::InvalidAmount("quantity must be non-negative".into()));
        }
        Ok(Money::new(self.amount_minor * factor, self.currency))
    }

    pub fn sum(items: &[Money]) -> Result<Money, AppError> {
        let mut iter = items.iter();
        let first = match iter.next() {
            Some(m) => *m,
            None => return Err(AppError::InvalidAmount("no items to sum".into())),
        };
        iter.try_fold(first, |acc, m| acc.add(m))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02} {}", self.amount_minor / 100, self.amount_minor % 100, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_same_currency_is_commutative_and_associative() {
        let a = Money::new(100, Currency::Eur);
        let b = Money::new(250, Currency::Eur);
        let c = Money::new(7, Currency::Eur);

        assert_eq!(a.add(&b).unwrap(), b.add(&a).unwrap());
        assert_eq!(
            a.add(&b).unwrap().add(&c).unwrap(),
            a.add(&b.add(&c).unwrap()).unwrap()
        );
    }

    #[test]
    fn zero_is_additive_identity() {
        let a = Money::new(500, Currency::Usd);
        let zero = Money::zero(Currency::Usd);
        assert_eq!(a.add(&zero).unwrap(), a);
    }

    #[test]
    fn mixing_currencies_fails() {
        let a = Money::new(100, Currency::Eur);
        let b = Money::new(100, Currency::Usd);
        assert!(matches!(a.add(&b), Err(AppError::CurrencyMismatch { .. })));
    }

    #[test]
    fn multiply_preserves_currency() {
        let a = Money::new(150, Currency::Gbp);
        let tripled = a.multiply(3).unwrap();
        assert_eq!(tripled.amount_minor, 450);
        assert_eq!(tripled.currency, Currency::Gbp);
    }
}
