pub mod period;
pub mod types;

pub use period::{Period, PeriodError};
pub use types::{
    CountryId, Currency, Flow, RawRecord, Scale, SourceId, TradeRecord, ValuationBasis,
};
