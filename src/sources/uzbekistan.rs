//! Statistics Agency of Uzbekistan: SDMX-style wide CSV keyed by `Klassifikator_en`.

use crate::data::{Currency, Flow, Scale, SourceId};
use crate::sources::layout::{
    default_missing_markers, ColumnRef, FlowSource, LayoutDescriptor, PeriodSource,
    ReporterSource, StartMarker,
};

pub fn layout() -> LayoutDescriptor {
    LayoutDescriptor {
        source: SourceId::Uzbekistan,
        start: StartMarker::HeaderRow("Klassifikator_en".into()),
        reporter: ReporterSource::Fixed("Uzbekistan".into()),
        partner: vec![ColumnRef::name("Klassifikator_en")],
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
    use crate::sources::table::read_table;

    #[test]
    fn test_sdmx_columns_ignored() {
        let csv = "\
Code,Klassifikator,Klassifikator_ru,Klassifikator_en,2010,2011,Unit
1,Германия,Германия,Germany,5,6,thous. USD
2,Италия,Италия,Italy,,7,thous. USD
";
        let table = read_table(&layout(), "uz.csv", csv.as_bytes()).unwrap();
        assert_eq!(table.records.len(), 3);
        assert!(table.records.iter().all(|r| r.reporter == "Uzbekistan"));
        assert!(table.row_issues.is_empty());
        let italy: Vec<_> = table.records.iter().filter(|r| r.partner == "Italy").collect();
        assert_eq!(italy[0].period, "2011");
    }
}
