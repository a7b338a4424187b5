use crate::canonical::countries::{CountryTable, MappingWarning};
use crate::canonical::rates::ExchangeRateTable;
use crate::data::{Period, RawRecord, SourceId, TradeRecord};
use crate::error::CanonicalizeError;
use std::sync::Arc;

/// Maps raw rows onto the canonical schema.
///
/// Pure: the same raw record, table and rates always give the same result.
/// Both tables are shared read-only, so one canonicalizer serves every
/// parsing thread.
#[derive(Debug, Clone)]
pub struct Canonicalizer {
    countries: Arc<CountryTable>,
    rates: Arc<ExchangeRateTable>,
}

/// One canonical record plus any label that had to pass through unmapped
#[derive(Debug, Clone, PartialEq)]
pub struct Canonicalized {
    pub record: TradeRecord,
    pub warnings: Vec<MappingWarning>,
}

impl Canonicalizer {
    pub fn new(countries: Arc<CountryTable>, rates: Arc<ExchangeRateTable>) -> Self {
        Self { countries, rates }
    }

    pub fn countries(&self) -> &CountryTable {
        &self.countries
    }

    pub fn rates(&self) -> &ExchangeRateTable {
        &self.rates
    }

    pub fn canonicalize(
        &self,
        raw: &RawRecord,
        source: SourceId,
    ) -> Result<Canonicalized, CanonicalizeError> {
        // 1. Period first: the conversion rate depends on the year
        let period = Period::parse(&raw.period)?;

        // 2. Value checks before conversion
        if !raw.value.is_finite() || raw.value < 0.0 {
            return Err(CanonicalizeError::InvalidValue(raw.value));
        }
        let value_eur = self
            .rates
            .to_eur(raw.value, raw.currency, raw.scale, period.year())?;

        // 3. Country identities
        let reporter = self.countries.resolve(&raw.reporter);
        let partner = self.countries.resolve(&raw.partner);
        let warnings = reporter.warning.into_iter().chain(partner.warning).collect();

        Ok(Canonicalized {
            record: TradeRecord {
                reporter: reporter.id,
                partner: partner.id,
                flow: raw.flow,
                period,
                value_eur,
                source,
                valuation: raw.valuation,
            },
            warnings,
        })
    }
}
