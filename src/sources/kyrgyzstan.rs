//! National Statistical Committee of the Kyrgyz Republic: imports by country.
//!
//! Wide sheet exported to CSV. The country is given in Kyrgyz, Russian and
//! English, followed by one column per year. Values are thousand USD.
//!
//! The committee's sheet carries no column header of its own. The CSV
//! export must name the columns in one row ahead of the data:
//! `Country_KZ,Country_RU,Country_EN,1994,1995,...`. Files without that
//! row fail with `ParseError::MarkerNotFound`.

use crate::data::{Currency, Flow, Scale, SourceId};
use crate::sources::layout::{
    default_missing_markers, ColumnRef, FlowSource, LayoutDescriptor, PeriodSource,
    ReporterSource, StartMarker,
};

pub fn layout() -> LayoutDescriptor {
    LayoutDescriptor {
        source: SourceId::Kyrgyzstan,
        start: StartMarker::HeaderRow("Country_EN".into()),
        reporter: ReporterSource::Fixed("Kyrgyzstan".into()),
        partner: vec![ColumnRef::name("Country_EN"), ColumnRef::name("Country_RU")],
        flow: FlowSource::Fixed(Flow::Import),
        period: PeriodSource::YearHeaders,
        values: Vec::new(),
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

    #[test]
    fn test_wide_sheet() {
        let csv = "\
Импорт товаров по странам,,,,
,,,,
Country_KZ,Country_RU,Country_EN,2021,2022
Германия,Германия,Germany,100 000,445 000
Франция,Франция,,12,-
";
        let table = read_table(&layout(), "kg_imports.csv", csv.as_bytes()).unwrap();

        assert_eq!(table.records.len(), 3);
        let germany: Vec<_> = table.records.iter().filter(|r| r.partner == "Germany").collect();
        assert_eq!(germany.len(), 2);
        assert_eq!(germany[1].value, 445_000.0);
        assert_eq!(germany[1].period, "2022");
        assert_eq!(germany[0].scale, Scale::Thousands);

        // English label empty, Russian one used instead
        let france: Vec<_> = table.records.iter().filter(|r| r.partner == "Франция").collect();
        assert_eq!(france.len(), 1);
        assert_eq!(france[0].reporter, "Kyrgyzstan");
    }

    #[test]
    fn test_sheet_without_named_columns_rejected() {
        let csv = "\
Импорт товаров по странам,,,,
,,,,
Германия,Германия,Germany,100 000,445 000
";
        let err = read_table(&layout(), "kg_imports.csv", csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ParseError::MarkerNotFound { .. }));
    }
}
