use crate::data::{Currency, PeriodError, SourceId};
use serde::Serialize;
use thiserror::Error;

/// Unrecognized or malformed source layout. Fatal for the file only.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot read {file}: {source}")]
    Io {
        file: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file}: start marker '{marker}' not found")]
    MarkerNotFound { file: String, marker: String },

    #[error("{file}: column '{column}' missing from header row")]
    MissingColumn { file: String, column: String },

    #[error("{file}: header row has no year columns")]
    NoYearColumns { file: String },

    #[error("{file}: no four-digit year in file name")]
    NoYearInFileName { file: String },
}

/// Layout descriptor that cannot work, caught when the descriptor is loaded
#[derive(Error, Debug, Clone, PartialEq)]
#[error("invalid layout for {source_id}: {reason}")]
pub struct LayoutError {
    pub source_id: SourceId,
    pub reason: String,
}

/// Failure to turn one raw record into a canonical one
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CanonicalizeError {
    #[error("no {currency:?} exchange rate configured for {year}")]
    MissingRate { year: i32, currency: Currency },

    #[error(transparent)]
    InvalidPeriod(#[from] PeriodError),

    #[error("value {0} is negative or not finite")]
    InvalidValue(f64),
}

/// Why a partner has no anomaly score
#[derive(Error, Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StatisticalUndefined {
    #[error("only {found} defined growth observations in the baseline window")]
    InsufficientObservations { found: usize },

    #[error("baseline growth has zero variance")]
    ZeroVariance,

    #[error("evaluation growth undefined (prior-year value is zero or missing)")]
    UndefinedEvaluationGrowth,

    #[error("fewer than two observations on one side of the break ({before} before, {after} after)")]
    InsufficientBreakSamples { before: usize, after: usize },
}

/// Run-level failures. Everything narrower is recorded in the diagnostics.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("none of the {attempted} configured source files could be read")]
    NoReadableSource { attempted: usize },

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_rate_message_names_year() {
        let err = CanonicalizeError::MissingRate {
            year: 2018,
            currency: Currency::Usd,
        };
        assert!(err.to_string().contains("2018"));
    }

    #[test]
    fn test_statistical_undefined_serializes_with_reason_tag() {
        let json = serde_json::to_value(StatisticalUndefined::InsufficientObservations { found: 1 }).unwrap();
        assert_eq!(json["reason"], "insufficient_observations");
        assert_eq!(json["found"], 1);
    }
}
