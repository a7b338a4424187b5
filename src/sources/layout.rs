use crate::data::{Currency, Flow, Scale, SourceId, ValuationBasis};
use crate::error::LayoutError;

/// Cell placeholders that mean "no data for this cell"
pub const DEFAULT_MISSING_MARKERS: &[&str] = &["", "-", "–", "—", ":", "..", "…", "x", "X"];

/// Column addressed by header label or by position
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnRef {
    Name(String),
    Index(usize),
}

impl ColumnRef {
    pub fn name(label: &str) -> Self {
        ColumnRef::Name(label.to_string())
    }

    pub fn describe(&self) -> String {
        match self {
            ColumnRef::Name(name) => name.clone(),
            ColumnRef::Index(idx) => format!("#{}", idx),
        }
    }
}

/// How the data region of a file is located
#[derive(Debug, Clone, PartialEq)]
pub enum StartMarker {
    /// First row containing a cell equal to the text is the header; data follows
    HeaderRow(String),
    /// Data starts at the first row whose cell in `column` contains the text
    DataRow { column: usize, text: String },
}

impl StartMarker {
    pub fn text(&self) -> &str {
        match self {
            StartMarker::HeaderRow(text) => text,
            StartMarker::DataRow { text, .. } => text,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReporterSource {
    Fixed(String),
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowSource {
    Fixed(Flow),
    Column(ColumnRef),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeriodSource {
    /// One period label per row
    Column(ColumnRef),
    /// Wide tables: every header cell holding a year is a value column
    YearHeaders,
    /// One file per year, the year is part of the file name
    FileName,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueColumn {
    pub column: ColumnRef,
    pub valuation: Option<ValuationBasis>,
}

impl ValueColumn {
    pub fn new(column: ColumnRef, valuation: Option<ValuationBasis>) -> Self {
        Self { column, valuation }
    }
}

/// Keep only rows whose cell equals the given text (case-insensitive)
#[derive(Debug, Clone, PartialEq)]
pub struct RowFilter {
    pub column: ColumnRef,
    pub equals: String,
}

/// Declarative description of one source's file layout
///
/// Structural assumptions about a source live here instead of in parsing
/// code, and are checked by `validate` before any file is opened.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutDescriptor {
    pub source: SourceId,
    pub start: StartMarker,
    pub reporter: ReporterSource,
    /// Partner label columns, first non-empty cell wins
    pub partner: Vec<ColumnRef>,
    pub flow: FlowSource,
    pub period: PeriodSource,
    /// Value columns for long and fixed layouts. Empty for `YearHeaders`.
    pub values: Vec<ValueColumn>,
    pub row_filter: Option<RowFilter>,
    pub currency: Currency,
    pub scale: Scale,
    pub missing_markers: Vec<String>,
}

impl LayoutDescriptor {
    pub fn validate(&self) -> Result<(), LayoutError> {
        let fail = |reason: &str| {
            Err(LayoutError {
                source_id: self.source,
                reason: reason.to_string(),
            })
        };

        if self.start.text().trim().is_empty() {
            return fail("start marker text is empty");
        }
        if self.partner.is_empty() {
            return fail("no partner column declared");
        }

        let has_header = matches!(self.start, StartMarker::HeaderRow(_));
        match self.period {
            PeriodSource::YearHeaders => {
                if !has_header {
                    return fail("year-header periods need a header row marker");
                }
                if !self.values.is_empty() {
                    return fail("year-header layouts take their values from the year columns");
                }
            }
            PeriodSource::Column(_) | PeriodSource::FileName => {
                if self.values.is_empty() {
                    return fail("no value column declared");
                }
            }
        }

        if !has_header && self.column_refs().any(|c| matches!(c, ColumnRef::Name(_))) {
            return fail("columns addressed by name need a header row marker");
        }

        if let Some(filter) = &self.row_filter {
            if filter.equals.trim().is_empty() {
                return fail("row filter has an empty match value");
            }
        }

        let mut bases: Vec<Option<ValuationBasis>> = self.values.iter().map(|v| v.valuation).collect();
        bases.sort();
        bases.dedup();
        if bases.len() != self.values.len() {
            return fail("two value columns share one valuation basis");
        }

        Ok(())
    }

    pub fn is_missing(&self, cell: &str) -> bool {
        let cell = cell.trim();
        self.missing_markers.iter().any(|m| m == cell)
    }

    fn column_refs(&self) -> impl Iterator<Item = &ColumnRef> {
        let reporter = match &self.reporter {
            ReporterSource::Column(c) => Some(c),
            ReporterSource::Fixed(_) => None,
        };
        let flow = match &self.flow {
            FlowSource::Column(c) => Some(c),
            FlowSource::Fixed(_) => None,
        };
        let period = match &self.period {
            PeriodSource::Column(c) => Some(c),
            _ => None,
        };

        self.partner
            .iter()
            .chain(reporter)
            .chain(flow)
            .chain(period)
            .chain(self.values.iter().map(|v| &v.column))
            .chain(self.row_filter.iter().map(|f| &f.column))
    }
}

pub fn default_missing_markers() -> Vec<String> {
    DEFAULT_MISSING_MARKERS.iter().map(|m| m.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_layout() -> LayoutDescriptor {
        LayoutDescriptor {
            source: SourceId::Armenia,
            start: StartMarker::HeaderRow("country".into()),
            reporter: ReporterSource::Fixed("Armenia".into()),
            partner: vec![ColumnRef::name("country")],
            flow: FlowSource::Fixed(Flow::Import),
            period: PeriodSource::Column(ColumnRef::name("year")),
            values: vec![ValueColumn::new(ColumnRef::name("value"), None)],
            row_filter: None,
            currency: Currency::Usd,
            scale: Scale::Thousands,
            missing_markers: default_missing_markers(),
        }
    }

    #[test]
    fn test_valid_layout() {
        assert!(long_layout().validate().is_ok());
    }

    #[test]
    fn test_named_columns_need_header() {
        let mut layout = long_layout();
        layout.start = StartMarker::DataRow {
            column: 0,
            text: "Total".into(),
        };
        let err = layout.validate().unwrap_err();
        assert!(err.reason.contains("header"));
    }

    #[test]
    fn test_year_headers_reject_explicit_values() {
        let mut layout = long_layout();
        layout.period = PeriodSource::YearHeaders;
        assert!(layout.validate().is_err());

        layout.values.clear();
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn test_duplicate_valuation_basis_rejected() {
        let mut layout = long_layout();
        layout.values = vec![
            ValueColumn::new(ColumnRef::name("a"), Some(ValuationBasis::Origin)),
            ValueColumn::new(ColumnRef::name("b"), Some(ValuationBasis::Origin)),
        ];
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_empty_marker_rejected() {
        let mut layout = long_layout();
        layout.start = StartMarker::HeaderRow("  ".into());
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_missing_markers() {
        let layout = long_layout();
        assert!(layout.is_missing("-"));
        assert!(layout.is_missing(" "));
        assert!(layout.is_missing(":"));
        assert!(!layout.is_missing("0"));
    }
}
