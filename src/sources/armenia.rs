//! Statistical Committee of Armenia: long CSV, imports by consignment and by origin.

use crate::data::{Currency, Flow, Scale, SourceId, ValuationBasis};
use crate::sources::layout::{
    default_missing_markers, ColumnRef, FlowSource, LayoutDescriptor, PeriodSource,
    ReporterSource, RowFilter, StartMarker, ValueColumn,
};

pub fn layout() -> LayoutDescriptor {
    LayoutDescriptor {
        source: SourceId::Armenia,
        start: StartMarker::HeaderRow("country".into()),
        reporter: ReporterSource::Fixed("Armenia".into()),
        partner: vec![ColumnRef::name("country")],
        flow: FlowSource::Fixed(Flow::Import),
        period: PeriodSource::Column(ColumnRef::name("year")),
        values: vec![
            // column name is misspelled in the published file
            ValueColumn::new(
                ColumnRef::name("import_consigment"),
                Some(ValuationBasis::Consignment),
            ),
            ValueColumn::new(ColumnRef::name("import_origin"), Some(ValuationBasis::Origin)),
        ],
        row_filter: Some(RowFilter {
            column: ColumnRef::name("timeperiod"),
            equals: "Year".into(),
        }),
        currency: Currency::Usd,
        scale: Scale::Thousands,
        missing_markers: default_missing_markers(),
    }
}
