//! Bureau of National Statistics of Kazakhstan: one file per year.
//!
//! The sheet has no usable header. Data starts at the "Всего" (total) row,
//! the partner name is in the first column and the import value in the sixth.

use crate::data::{Currency, Flow, Scale, SourceId};
use crate::sources::layout::{
    default_missing_markers, ColumnRef, FlowSource, LayoutDescriptor, PeriodSource,
    ReporterSource, StartMarker, ValueColumn,
};

pub const TOTAL_ROW_MARKER: &str = "Всего";

pub fn layout() -> LayoutDescriptor {
    LayoutDescriptor {
        source: SourceId::Kazakhstan,
        start: StartMarker::DataRow {
            column: 0,
            text: TOTAL_ROW_MARKER.into(),
        },
        reporter: ReporterSource::Fixed("Kazakhstan".into()),
        partner: vec![ColumnRef::Index(0)],
        flow: FlowSource::Fixed(Flow::Import),
        period: PeriodSource::FileName,
        values: vec![ValueColumn::new(ColumnRef::Index(5), None)],
        row_filter: None,
        currency: Currency::Usd,
        scale: Scale::Thousands,
        missing_markers: default_missing_markers(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::sources::table::read_table;

    const SHEET: &str = "\
Внешняя торговля,,,,,
,,,,,
,тыс. долл. США,,,,
Всего,1,2,3,4,5000
Германия,1,2,3,4,\"1 200.5\"
Азия,1,2,3,4,900
Китай,1,2,3,4,-
";

    #[test]
    fn test_year_from_file_name() {
        let table = read_table(&layout(), "kz/2022_imports.csv", SHEET.as_bytes()).unwrap();

        // total row, Germany and the region row; the region is dropped later as a meta partner
        assert_eq!(table.records.len(), 3);
        assert!(table.records.iter().all(|r| r.period == "2022"));
        assert_eq!(table.records[0].partner, "Всего");
        assert_eq!(table.records[1].partner, "Германия");
        assert_eq!(table.records[1].value, 1200.5);
    }

    #[test]
    fn test_missing_total_row() {
        let csv = "Германия,1,2,3,4,10\n";
        let err = read_table(&layout(), "2022.csv", csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MarkerNotFound { .. }));
    }

    #[test]
    fn test_file_name_without_year() {
        let err = read_table(&layout(), "imports.csv", SHEET.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::NoYearInFileName { .. }));
    }
}
