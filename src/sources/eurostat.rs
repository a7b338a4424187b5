//! Eurostat Comext extract: long format, one row per reporter/partner/flow/period.

use crate::data::{Currency, Scale, SourceId};
use crate::sources::layout::{
    default_missing_markers, ColumnRef, FlowSource, LayoutDescriptor, PeriodSource,
    ReporterSource, StartMarker, ValueColumn,
};

pub fn layout() -> LayoutDescriptor {
    LayoutDescriptor {
        source: SourceId::Eurostat,
        start: StartMarker::HeaderRow("PARTNER".into()),
        reporter: ReporterSource::Column(ColumnRef::name("REPORTER")),
        partner: vec![ColumnRef::name("PARTNER")],
        flow: FlowSource::Column(ColumnRef::name("FLOW")),
        period: PeriodSource::Column(ColumnRef::name("PERIOD")),
        values: vec![ValueColumn::new(ColumnRef::name("VALUE_IN_EUR"), None)],
        row_filter: None,
        currency: Currency::Eur,
        scale: Scale::Units,
        missing_markers: default_missing_markers(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Flow, RawRecord};
    use crate::sources::table::read_table;

    const SAMPLE: &str = "\
REPORTER,PARTNER,PRODUCT,FLOW,STAT_PROCEDURE,PERIOD,VALUE_IN_EUR
Germany,Kyrgyzstan,TOTAL,EXPORT,TOTAL,Aug. 2024,1250000
Germany,Kyrgyzstan,TOTAL,EXPORT,TOTAL,202409-Sep. 2024,\"1,300,000\"
France,Kazakhstan,TOTAL,IMPORT,TOTAL,Y2022,:
Italy,Armenia,TOTAL,2,TOTAL,2022,42
";

    fn parse() -> Vec<RawRecord> {
        read_table(&layout(), "comext.csv", SAMPLE.as_bytes())
            .unwrap()
            .records
    }

    #[test]
    fn test_reads_long_rows() {
        let records = parse();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].reporter, "Germany");
        assert_eq!(records[0].partner, "Kyrgyzstan");
        assert_eq!(records[0].period, "Aug. 2024");
        assert_eq!(records[0].currency, Currency::Eur);
        assert_eq!(records[1].value, 1_300_000.0);
    }

    #[test]
    fn test_numeric_flow_codes() {
        let records = parse();
        assert_eq!(records[2].flow, Flow::Export);
        assert_eq!(records[2].reporter, "Italy");
    }

    #[test]
    fn test_placeholder_is_not_zero() {
        assert!(parse().iter().all(|r| r.reporter != "France"));
    }
}
