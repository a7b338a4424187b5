use crate::data::{Currency, Scale};
use crate::error::CanonicalizeError;
use std::collections::BTreeMap;

/// Annual exchange rates, native currency units per EUR.
///
/// A year without a rate is an error at conversion time, never a silent 1.0.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExchangeRateTable {
    usd_per_eur: BTreeMap<i32, f64>,
}

impl ExchangeRateTable {
    pub fn new(usd_per_eur: BTreeMap<i32, f64>) -> Self {
        Self { usd_per_eur }
    }

    /// Annual average USD/EUR rates used by the national-data conversions
    pub fn with_defaults() -> Self {
        let rates = [(2019, 1.12), (2020, 1.14), (2021, 1.18), (2022, 1.05), (2023, 1.07)];
        Self::new(rates.into_iter().collect())
    }

    pub fn rate(&self, currency: Currency, year: i32) -> Result<f64, CanonicalizeError> {
        match currency {
            Currency::Eur => Ok(1.0),
            Currency::Usd => self
                .usd_per_eur
                .get(&year)
                .copied()
                .ok_or(CanonicalizeError::MissingRate { year, currency }),
        }
    }

    /// `eur = native × scale / rate(year)`
    pub fn to_eur(
        &self,
        value: f64,
        currency: Currency,
        scale: Scale,
        year: i32,
    ) -> Result<f64, CanonicalizeError> {
        Ok(value * scale.factor() / self.rate(currency, year)?)
    }

    /// Inverse of `to_eur`, for showing values in the reporter's own currency
    pub fn from_eur(
        &self,
        value_eur: f64,
        currency: Currency,
        scale: Scale,
        year: i32,
    ) -> Result<f64, CanonicalizeError> {
        Ok(value_eur * self.rate(currency, year)? / scale.factor())
    }

    pub fn years(&self) -> impl Iterator<Item = i32> + '_ {
        self.usd_per_eur.keys().copied()
    }

    pub fn insert(&mut self, year: i32, usd_per_eur: f64) {
        self.usd_per_eur.insert(year, usd_per_eur);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousand_usd_to_eur() {
        let rates = ExchangeRateTable::with_defaults();
        let eur = rates.to_eur(105.0, Currency::Usd, Scale::Thousands, 2022).unwrap();
        assert!((eur - 100_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_eur_needs_no_rate() {
        let rates = ExchangeRateTable::default();
        assert_eq!(rates.to_eur(42.0, Currency::Eur, Scale::Units, 1999).unwrap(), 42.0);
    }

    #[test]
    fn test_missing_rate_is_error() {
        let rates = ExchangeRateTable::with_defaults();
        let err = rates.to_eur(1.0, Currency::Usd, Scale::Units, 2015).unwrap_err();
        assert_eq!(
            err,
            CanonicalizeError::MissingRate {
                year: 2015,
                currency: Currency::Usd
            }
        );
    }

    #[test]
    fn test_round_trip() {
        let rates = ExchangeRateTable::with_defaults();
        let eur = rates.to_eur(123.456, Currency::Usd, Scale::Thousands, 2021).unwrap();
        let back = rates.from_eur(eur, Currency::Usd, Scale::Thousands, 2021).unwrap();
        assert!((back - 123.456).abs() < 1e-9);
    }
}
