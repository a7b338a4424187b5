use crate::analysis::UndefinedScore;
use crate::canonical::MappingWarning;
use crate::data::{CountryId, SourceId};
use crate::error::StatisticalUndefined;
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-file parse outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSummary {
    pub source: SourceId,
    pub file: String,
    pub rows_read: usize,
    pub records: usize,
    pub row_issues: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub source: SourceId,
    pub file: String,
    pub error: String,
}

/// A row or record that was dropped, with where it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedRow {
    pub source: SourceId,
    pub file: String,
    pub line: usize,
    pub reason: String,
}

/// Everything that went wrong short of aborting the run.
///
/// Always part of the output, even when every list is empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Diagnostics {
    pub files: Vec<FileSummary>,
    pub file_failures: Vec<FileFailure>,
    /// Cells that could not be read
    pub row_issues: Vec<RejectedRow>,
    /// Records with an unusable period or value
    pub rejected_records: Vec<RejectedRow>,
    /// Unmapped raw label -> occurrences
    pub unmapped_labels: BTreeMap<String, usize>,
    /// Year without an exchange rate -> records excluded
    pub missing_rates: BTreeMap<i32, usize>,
    /// Records outside a source's configured year range
    pub out_of_range: BTreeMap<SourceId, usize>,
    pub undefined_scores: Vec<UndefinedScore>,
    pub undefined_breaks: Vec<(CountryId, StatisticalUndefined)>,
}

impl Diagnostics {
    pub fn record_mapping(&mut self, warning: &MappingWarning) {
        *self.unmapped_labels.entry(warning.label.clone()).or_insert(0) += 1;
    }

    pub fn record_missing_rate(&mut self, year: i32) {
        *self.missing_rates.entry(year).or_insert(0) += 1;
    }

    pub fn record_out_of_range(&mut self, source: SourceId) {
        *self.out_of_range.entry(source).or_insert(0) += 1;
    }

    pub fn missing_rate_total(&self) -> usize {
        self.missing_rates.values().sum()
    }

    pub fn mapping_warning_total(&self) -> usize {
        self.unmapped_labels.values().sum()
    }

    pub fn is_clean(&self) -> bool {
        self.file_failures.is_empty()
            && self.row_issues.is_empty()
            && self.rejected_records.is_empty()
            && self.unmapped_labels.is_empty()
            && self.missing_rates.is_empty()
    }

    /// Fold another run-fragment's diagnostics into this one
    pub fn absorb(&mut self, other: Diagnostics) {
        self.files.extend(other.files);
        self.file_failures.extend(other.file_failures);
        self.row_issues.extend(other.row_issues);
        self.rejected_records.extend(other.rejected_records);
        for (label, n) in other.unmapped_labels {
            *self.unmapped_labels.entry(label).or_insert(0) += n;
        }
        for (year, n) in other.missing_rates {
            *self.missing_rates.entry(year).or_insert(0) += n;
        }
        for (source, n) in other.out_of_range {
            *self.out_of_range.entry(source).or_insert(0) += n;
        }
        self.undefined_scores.extend(other.undefined_scores);
        self.undefined_breaks.extend(other.undefined_breaks);
    }
}
