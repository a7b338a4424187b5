use crate::aggregate::{StoreFilter, TradeStore};
use crate::analysis::{
    discrepancy, AnomalyDetector, AnomalyReport, BreakConfig, BreakDetector, BreakReport,
    DetectionConfig, DiscrepancyConfig, DiscrepancyEngine, DiscrepancyRecord, Rollup, SortOrder,
};
use crate::canonical::{Canonicalizer, CountryTable, ExchangeRateTable};
use crate::data::{SourceId, TradeRecord};
use crate::error::{CanonicalizeError, ParseError, PipelineError};
use crate::pipeline::diagnostics::{Diagnostics, FileFailure, FileSummary, RejectedRow};
use crate::sources::{adapter_for, ParsedTable, SourceAdapter};
use crate::utils::config::{Config, SourceConfig};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Files of one source plus the years to keep
#[derive(Debug, Clone, PartialEq)]
pub struct SourceInput {
    pub source: SourceId,
    pub paths: Vec<PathBuf>,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
}

impl SourceInput {
    pub fn new(source: SourceId, paths: Vec<PathBuf>) -> Self {
        Self {
            source,
            paths,
            first_year: None,
            last_year: None,
        }
    }

    fn admits(&self, year: i32) -> bool {
        self.first_year.map_or(true, |first| year >= first)
            && self.last_year.map_or(true, |last| year <= last)
    }
}

impl From<&SourceConfig> for SourceInput {
    fn from(config: &SourceConfig) -> Self {
        Self {
            source: config.id,
            paths: config.paths.clone(),
            first_year: config.first_year,
            last_year: config.last_year,
        }
    }
}

/// Canonical records of a run plus what went wrong getting them
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    pub records: Vec<TradeRecord>,
    pub diagnostics: Diagnostics,
}

/// Parameters of the analysis stage
#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    pub detection: DetectionConfig,
    pub filter: StoreFilter,
    pub discrepancy: DiscrepancyConfig,
    pub breaks: Option<BreakConfig>,
}

impl AnalysisSettings {
    pub fn from_config(config: &Config, countries: &CountryTable) -> anyhow::Result<Self> {
        let breaks = if config.breaks.enabled {
            Some(config.break_config()?)
        } else {
            None
        };
        Ok(Self {
            detection: config.detection_config(),
            filter: config.analysis_filter(countries),
            discrepancy: config.discrepancy_config(countries),
            breaks,
        })
    }
}

/// Every table a run produces
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub records: Vec<TradeRecord>,
    pub anomalies: AnomalyReport,
    pub discrepancies: Vec<DiscrepancyRecord>,
    pub discrepancy_by_reporter: Vec<Rollup>,
    pub discrepancy_by_year: Vec<Rollup>,
    pub significant_discrepancies: usize,
    pub breaks: Option<BreakReport>,
    pub diagnostics: Diagnostics,
}

/// Batch pipeline: parse, canonicalize, merge, analyze.
///
/// Holds no state between runs apart from its immutable tables.
pub struct Pipeline {
    countries: Arc<CountryTable>,
    canonicalizer: Canonicalizer,
    adapters: BTreeMap<SourceId, Box<dyn SourceAdapter>>,
}

impl Pipeline {
    /// Pipeline with the built-in layout of every source
    pub fn new(countries: Arc<CountryTable>, rates: Arc<ExchangeRateTable>) -> Result<Self, PipelineError> {
        let mut adapters: BTreeMap<SourceId, Box<dyn SourceAdapter>> = BTreeMap::new();
        for source in SourceId::all() {
            adapters.insert(*source, Box::new(adapter_for(*source)?));
        }
        Ok(Self {
            canonicalizer: Canonicalizer::new(countries.clone(), rates),
            countries,
            adapters,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let countries = Arc::new(config.country_table()?);
        let rates = Arc::new(config.rate_table()?);
        Ok(Self::new(countries, rates)?)
    }

    /// Replace the adapter of one source
    pub fn with_adapter(mut self, adapter: Box<dyn SourceAdapter>) -> Self {
        self.adapters.insert(adapter.source_id(), adapter);
        self
    }

    pub fn countries(&self) -> Arc<CountryTable> {
        self.countries.clone()
    }

    /// Parse every file in parallel and canonicalize the rows.
    ///
    /// A file that fails to parse is recorded and skipped. Only when no
    /// file at all could be read does the run abort.
    pub fn ingest(&self, inputs: &[SourceInput]) -> Result<Ingested, PipelineError> {
        let mut diagnostics = Diagnostics::default();

        // 1. Expand directories into their CSV files
        let mut jobs: Vec<(&SourceInput, PathBuf)> = Vec::new();
        for input in inputs {
            for path in &input.paths {
                match expand(path) {
                    Ok(files) => jobs.extend(files.into_iter().map(|f| (input, f))),
                    Err(err) => {
                        warn!("{}: {}", input.source, err);
                        diagnostics.file_failures.push(FileFailure {
                            source: input.source,
                            file: path.display().to_string(),
                            error: err.to_string(),
                        });
                    }
                }
            }
        }
        let attempted = jobs.len() + diagnostics.file_failures.len();
        info!("Parsing {} file(s) from {} source(s)", jobs.len(), inputs.len());

        // 2. Parse in parallel; results keep job order
        let parsed = self.parse_all(&jobs);

        // 3. Canonicalize sequentially so record order is deterministic
        let mut records = Vec::new();
        let mut readable = 0;
        for ((input, path), outcome) in jobs.iter().zip(parsed) {
            let file = path.display().to_string();
            match outcome {
                Ok(table) => {
                    readable += 1;
                    let before = records.len();
                    self.canonicalize_table(input, &file, table, &mut records, &mut diagnostics);
                    debug!("{}: {} canonical records", file, records.len() - before);
                }
                Err(err) => {
                    warn!("{}: {}", input.source, err);
                    diagnostics.file_failures.push(FileFailure {
                        source: input.source,
                        file,
                        error: err.to_string(),
                    });
                }
            }
        }

        if readable == 0 {
            return Err(PipelineError::NoReadableSource { attempted });
        }

        if !diagnostics.unmapped_labels.is_empty() {
            warn!(
                "{} unmapped country label(s), {} occurrence(s)",
                diagnostics.unmapped_labels.len(),
                diagnostics.mapping_warning_total()
            );
        }
        if !diagnostics.missing_rates.is_empty() {
            warn!(
                "{} record(s) excluded for missing exchange rates in {:?}",
                diagnostics.missing_rate_total(),
                diagnostics.missing_rates.keys().collect::<Vec<_>>()
            );
        }
        info!("Ingested {} canonical records from {} file(s)", records.len(), readable);

        Ok(Ingested { records, diagnostics })
    }

    /// Ingest, merge and run every analysis
    pub fn run(&self, inputs: &[SourceInput], settings: &AnalysisSettings) -> Result<RunOutput, PipelineError> {
        let Ingested { records, diagnostics } = self.ingest(inputs)?;
        let store = TradeStore::from_records(self.countries(), &records);
        Ok(analyze(store, records, diagnostics, settings))
    }

    fn parse_all(&self, jobs: &[(&SourceInput, PathBuf)]) -> Vec<Result<ParsedTable, ParseError>> {
        let outcome = crossbeam::scope(|scope| {
            let handles: Vec<_> = jobs
                .iter()
                .map(|(input, path)| {
                    let adapter = self.adapters.get(&input.source);
                    scope.spawn(move |_| match adapter {
                        Some(adapter) => adapter.parse_file(path),
                        None => Err(ParseError::Io {
                            file: path.display().to_string(),
                            source: std::io::Error::new(
                                std::io::ErrorKind::Unsupported,
                                format!("no adapter registered for {}", input.source),
                            ),
                        }),
                    })
                })
                .collect();

            handles
                .into_iter()
                .zip(jobs)
                .map(|(handle, (_, path))| {
                    handle.join().unwrap_or_else(|_| {
                        Err(ParseError::Io {
                            file: path.display().to_string(),
                            source: std::io::Error::new(std::io::ErrorKind::Other, "parser thread panicked"),
                        })
                    })
                })
                .collect::<Vec<_>>()
        });

        // the scope only fails if a thread panicked without being joined; every handle is joined above
        outcome.unwrap_or_default()
    }

    fn canonicalize_table(
        &self,
        input: &SourceInput,
        file: &str,
        table: ParsedTable,
        records: &mut Vec<TradeRecord>,
        diagnostics: &mut Diagnostics,
    ) {
        diagnostics.files.push(FileSummary {
            source: input.source,
            file: file.to_string(),
            rows_read: table.rows_read,
            records: table.records.len(),
            row_issues: table.row_issues.len(),
        });
        diagnostics
            .row_issues
            .extend(table.row_issues.into_iter().map(|issue| RejectedRow {
                source: input.source,
                file: file.to_string(),
                line: issue.line,
                reason: issue.message,
            }));

        for raw in &table.records {
            match self.canonicalizer.canonicalize(raw, input.source) {
                Ok(out) => {
                    for warning in &out.warnings {
                        diagnostics.record_mapping(warning);
                    }
                    if !input.admits(out.record.period.year()) {
                        diagnostics.record_out_of_range(input.source);
                        continue;
                    }
                    records.push(out.record);
                }
                Err(CanonicalizeError::MissingRate { year, .. }) => diagnostics.record_missing_rate(year),
                Err(err) => diagnostics.rejected_records.push(RejectedRow {
                    source: input.source,
                    file: file.to_string(),
                    line: raw.line,
                    reason: err.to_string(),
                }),
            }
        }
    }
}

/// Run every analysis over an already merged store
pub fn analyze(
    store: TradeStore,
    records: Vec<TradeRecord>,
    mut diagnostics: Diagnostics,
    settings: &AnalysisSettings,
) -> RunOutput {
    // 1. Growth anomalies
    let series = store.annual_by_partner(&settings.filter);
    let anomalies = AnomalyDetector::new(settings.detection.clone()).detect(&series);
    diagnostics.undefined_scores = anomalies.undefined.clone();
    info!(
        "Scored {} partner(s) for {}, {} flagged, {} undefined",
        anomalies.ranked.len(),
        anomalies.eval_year,
        anomalies.flagged_count(),
        anomalies.undefined.len()
    );

    // 2. Mirror-statistics discrepancies
    let engine = DiscrepancyEngine::new(settings.discrepancy.clone());
    let discrepancies = engine.compare(&store);
    let significant_discrepancies = engine.significant(&discrepancies).len();
    let discrepancy_by_reporter = discrepancy::sorted(discrepancy::by_reporter(&discrepancies), SortOrder::Descending);
    let discrepancy_by_year = discrepancy::sorted(discrepancy::by_year(&discrepancies), SortOrder::Descending);
    info!(
        "{} discrepancy record(s), {} above {}%",
        discrepancies.len(),
        significant_discrepancies,
        settings.discrepancy.significance_pct
    );

    // 3. Structural breaks on monthly series
    let breaks = settings.breaks.as_ref().map(|config| {
        let monthly = store.monthly_by_partner(&settings.filter);
        let report = BreakDetector::new(config.clone()).run(&monthly);
        diagnostics.undefined_breaks = report.undefined.clone();
        report
    });

    RunOutput {
        records,
        anomalies,
        discrepancies,
        discrepancy_by_reporter,
        discrepancy_by_year,
        significant_discrepancies,
        breaks,
        diagnostics,
    }
}

/// A file stays a file; a directory yields its `.csv` files in name order
fn expand(path: &Path) -> std::io::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files: Vec<PathBuf> = std::fs::read_dir(path)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}
