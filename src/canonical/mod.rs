pub mod canonicalizer;
pub mod countries;
pub mod rates;

pub use canonicalizer::{Canonicalized, Canonicalizer};
pub use countries::{
    AliasConflict, CanonicalCountry, CountryKind, CountryTable, MappingWarning, Resolution,
};
pub use rates::ExchangeRateTable;
