pub mod layout;
pub mod table;

pub mod armenia;
pub mod eurostat;
pub mod kazakhstan;
pub mod kyrgyzstan;
pub mod uzbekistan;

pub use layout::{
    ColumnRef, FlowSource, LayoutDescriptor, PeriodSource, ReporterSource, RowFilter, StartMarker,
    ValueColumn,
};
pub use table::{ParsedTable, RowIssue};

use crate::data::SourceId;
use crate::error::{LayoutError, ParseError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// A source of raw trade rows.
///
/// Adapters are stateless: parsing one file never depends on another, so
/// files can be handed to separate threads.
pub trait SourceAdapter: Send + Sync {
    fn source_id(&self) -> SourceId;

    fn layout(&self) -> &LayoutDescriptor;

    /// Parse an already-open stream. `file_name` is used for error messages
    /// and, for per-year layouts, to recover the year.
    fn parse_reader(&self, file_name: &str, reader: &mut dyn Read) -> Result<ParsedTable, ParseError>;

    fn parse_file(&self, path: &Path) -> Result<ParsedTable, ParseError> {
        let file_name = path.display().to_string();
        let file = File::open(path).map_err(|source| ParseError::Io {
            file: file_name.clone(),
            source,
        })?;
        let mut reader = BufReader::new(file);
        self.parse_reader(&file_name, &mut reader)
    }
}

/// Adapter driven entirely by a validated layout descriptor
#[derive(Debug, Clone)]
pub struct TableAdapter {
    layout: LayoutDescriptor,
}

impl TableAdapter {
    /// Validate the descriptor up front so a broken layout never reaches a file
    pub fn new(layout: LayoutDescriptor) -> Result<Self, LayoutError> {
        layout.validate()?;
        Ok(Self { layout })
    }
}

impl SourceAdapter for TableAdapter {
    fn source_id(&self) -> SourceId {
        self.layout.source
    }

    fn layout(&self) -> &LayoutDescriptor {
        &self.layout
    }

    fn parse_reader(&self, file_name: &str, reader: &mut dyn Read) -> Result<ParsedTable, ParseError> {
        table::read_table(&self.layout, file_name, reader)
    }
}

/// Built-in layout for a source
pub fn default_layout(source: SourceId) -> LayoutDescriptor {
    match source {
        SourceId::Eurostat => eurostat::layout(),
        SourceId::Kyrgyzstan => kyrgyzstan::layout(),
        SourceId::Kazakhstan => kazakhstan::layout(),
        SourceId::Armenia => armenia::layout(),
        SourceId::Uzbekistan => uzbekistan::layout(),
    }
}

pub fn adapter_for(source: SourceId) -> Result<TableAdapter, LayoutError> {
    TableAdapter::new(default_layout(source))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_all_builtin_layouts_validate() {
        for source in SourceId::all() {
            assert!(adapter_for(*source).is_ok(), "{} layout invalid", source);
        }
    }

    #[test]
    fn test_broken_layout_rejected_at_construction() {
        let mut layout = default_layout(SourceId::Armenia);
        layout.partner.clear();
        let err = TableAdapter::new(layout).unwrap_err();
        assert_eq!(err.source_id, SourceId::Armenia);
    }

    #[test]
    fn test_parse_file_reports_missing_file() {
        let adapter = adapter_for(SourceId::Kyrgyzstan).unwrap();
        let err = adapter.parse_file(Path::new("/nonexistent/kg.csv")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    #[test]
    fn test_parse_file_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Country_KZ,Country_RU,Country_EN,2021,2022").unwrap();
        writeln!(file, "Германия,Германия,Germany,100,200").unwrap();
        file.flush().unwrap();

        let adapter = adapter_for(SourceId::Kyrgyzstan).unwrap();
        let table = adapter.parse_file(file.path()).unwrap();
        assert_eq!(table.records.len(), 2);
        assert!(table.records.iter().all(|r| r.partner == "Germany"));
    }
}
