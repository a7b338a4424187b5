//! Generic reader that executes a `LayoutDescriptor` against a CSV file.

use crate::data::{Flow, Period, RawRecord, ValuationBasis};
use crate::error::ParseError;
use crate::sources::layout::{
    ColumnRef, FlowSource, LayoutDescriptor, PeriodSource, ReporterSource, StartMarker,
};
use csv::StringRecord;
use serde::Serialize;
use std::io::Read;

/// A row that could not be turned into raw records. The file still parses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowIssue {
    pub line: usize,
    pub message: String,
}

/// Adapter output for one file
#[derive(Debug, Clone, Default)]
pub struct ParsedTable {
    pub records: Vec<RawRecord>,
    pub row_issues: Vec<RowIssue>,
    pub rows_read: usize,
}

#[derive(Clone, Copy)]
enum Resolved<T> {
    Fixed(T),
    Column(usize),
}

/// One value cell to extract from every data row
struct ValueSlot {
    column: usize,
    label: String,
    period: Option<String>,
    valuation: Option<ValuationBasis>,
}

pub fn read_table<R: Read>(
    layout: &LayoutDescriptor,
    file_name: &str,
    reader: R,
) -> Result<ParsedTable, ParseError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows: Vec<(usize, StringRecord)> = Vec::new();
    for (idx, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|source| ParseError::Csv {
            file: file_name.to_string(),
            source,
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 1);
        rows.push((line, record));
    }

    let (header, data_start) = locate_start(layout, file_name, &rows)?;

    let resolve = |column: &ColumnRef| resolve_column(column, header, file_name);

    let reporter_at = match &layout.reporter {
        ReporterSource::Column(c) => Resolved::Column(resolve(c)?),
        ReporterSource::Fixed(name) => Resolved::Fixed(name.as_str()),
    };
    let flow_at = match &layout.flow {
        FlowSource::Column(c) => Resolved::Column(resolve(c)?),
        FlowSource::Fixed(flow) => Resolved::Fixed(*flow),
    };
    let partner_cols = layout
        .partner
        .iter()
        .map(&resolve)
        .collect::<Result<Vec<_>, _>>()?;
    let filter = match &layout.row_filter {
        Some(f) => Some((resolve(&f.column)?, f.equals.as_str())),
        None => None,
    };

    let mut period_col = None;
    let slots: Vec<ValueSlot> = match &layout.period {
        PeriodSource::Column(c) => {
            period_col = Some(resolve(c)?);
            value_slots(layout, &resolve, None)?
        }
        PeriodSource::FileName => {
            let year = year_in_file_name(file_name).ok_or_else(|| ParseError::NoYearInFileName {
                file: file_name.to_string(),
            })?;
            value_slots(layout, &resolve, Some(year.to_string()))?
        }
        PeriodSource::YearHeaders => year_slots(header, file_name)?,
    };

    let mut table = ParsedTable::default();

    for (line, row) in &rows[data_start..] {
        let line = *line;
        if row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        table.rows_read += 1;

        if let Some((col, expected)) = filter {
            if !cell(row, col).eq_ignore_ascii_case(expected) {
                continue;
            }
        }

        let partner = match partner_cols
            .iter()
            .map(|&c| cell(row, c))
            .find(|label| !layout.is_missing(label))
        {
            Some(label) if is_country_label(label) => label.to_string(),
            _ => continue,
        };

        let reporter = match reporter_at {
            Resolved::Fixed(name) => name.to_string(),
            Resolved::Column(col) => cell(row, col).to_string(),
        };
        if reporter.is_empty() {
            table.row_issues.push(RowIssue {
                line,
                message: "empty reporter".to_string(),
            });
            continue;
        }

        let flow = match flow_at {
            Resolved::Fixed(flow) => flow,
            Resolved::Column(col) => match Flow::parse(cell(row, col)) {
                Some(flow) => flow,
                None => {
                    table.row_issues.push(RowIssue {
                        line,
                        message: format!("unknown flow '{}'", cell(row, col)),
                    });
                    continue;
                }
            },
        };

        for slot in &slots {
            let raw = cell(row, slot.column);
            if layout.is_missing(raw) {
                continue;
            }
            let value = match parse_number(raw) {
                Some(v) => v,
                None => {
                    table.row_issues.push(RowIssue {
                        line,
                        message: format!("unparseable value '{}' in column {}", raw, slot.label),
                    });
                    continue;
                }
            };
            let period = match (&slot.period, period_col) {
                (Some(label), _) => label.clone(),
                (None, Some(col)) => cell(row, col).to_string(),
                (None, None) => String::new(),
            };
            if period.is_empty() {
                table.row_issues.push(RowIssue {
                    line,
                    message: "empty period".to_string(),
                });
                continue;
            }

            table.records.push(RawRecord {
                reporter: reporter.clone(),
                partner: partner.clone(),
                period,
                value,
                currency: layout.currency,
                scale: layout.scale,
                flow,
                valuation: slot.valuation,
                line,
            });
        }
    }

    Ok(table)
}

fn locate_start<'a>(
    layout: &LayoutDescriptor,
    file_name: &str,
    rows: &'a [(usize, StringRecord)],
) -> Result<(Option<&'a StringRecord>, usize), ParseError> {
    let not_found = || ParseError::MarkerNotFound {
        file: file_name.to_string(),
        marker: layout.start.text().to_string(),
    };

    match &layout.start {
        StartMarker::HeaderRow(text) => {
            let idx = rows
                .iter()
                .position(|(_, row)| row.iter().any(|c| same_label(c, text)))
                .ok_or_else(not_found)?;
            Ok((Some(&rows[idx].1), idx + 1))
        }
        StartMarker::DataRow { column, text } => {
            let idx = rows
                .iter()
                .position(|(_, row)| cell(row, *column).contains(text.as_str()))
                .ok_or_else(not_found)?;
            Ok((None, idx))
        }
    }
}

fn resolve_column(
    column: &ColumnRef,
    header: Option<&StringRecord>,
    file_name: &str,
) -> Result<usize, ParseError> {
    match column {
        ColumnRef::Index(idx) => Ok(*idx),
        ColumnRef::Name(name) => header
            .and_then(|h| h.iter().position(|c| same_label(c, name)))
            .ok_or_else(|| ParseError::MissingColumn {
                file: file_name.to_string(),
                column: name.clone(),
            }),
    }
}

fn value_slots<F>(
    layout: &LayoutDescriptor,
    resolve: &F,
    period: Option<String>,
) -> Result<Vec<ValueSlot>, ParseError>
where
    F: Fn(&ColumnRef) -> Result<usize, ParseError>,
{
    layout
        .values
        .iter()
        .map(|v| {
            Ok(ValueSlot {
                column: resolve(&v.column)?,
                label: v.column.describe(),
                period: period.clone(),
                valuation: v.valuation,
            })
        })
        .collect()
}

fn year_slots(header: Option<&StringRecord>, file_name: &str) -> Result<Vec<ValueSlot>, ParseError> {
    let slots: Vec<ValueSlot> = header
        .map(|h| {
            h.iter()
                .enumerate()
                .filter_map(|(idx, label)| match Period::parse(label) {
                    Ok(Period::Year(year)) => Some(ValueSlot {
                        column: idx,
                        label: label.to_string(),
                        period: Some(year.to_string()),
                        valuation: None,
                    }),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    if slots.is_empty() {
        return Err(ParseError::NoYearColumns {
            file: file_name.to_string(),
        });
    }
    Ok(slots)
}

fn cell(row: &StringRecord, idx: usize) -> &str {
    row.get(idx).unwrap_or("").trim()
}

fn same_label(cell: &str, label: &str) -> bool {
    cell.trim().trim_start_matches('\u{feff}').eq_ignore_ascii_case(label.trim())
}

/// Rows labelled only with digits and punctuation are sub-totals or codes
fn is_country_label(label: &str) -> bool {
    label.chars().any(|c| c.is_alphabetic())
}

/// Parse a numeric cell, dropping thousands separators
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, ',' | ' ' | '\u{a0}' | '\u{202f}' | '\''))
        .collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// First run of exactly four digits that reads as a plausible year
pub fn year_in_file_name(file_name: &str) -> Option<i32> {
    let stem = std::path::Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    let chars: Vec<char> = stem.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_ascii_digit() {
            let start = i;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            if i - start == 4 {
                let year: i32 = chars[start..i].iter().collect::<String>().parse().ok()?;
                if (1900..=2100).contains(&year) {
                    return Some(year);
                }
            }
        } else {
            i += 1;
        }
    }
    None
}
