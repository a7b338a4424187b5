use crate::aggregate::{MetaPartners, StoreFilter};
use crate::analysis::{
    BaselineConfig, BaselinePolicy, BreakConfig, DetectionConfig, DiscrepancyConfig, ReporterScope,
    StdDevKind,
};
use crate::canonical::{CountryTable, ExchangeRateTable};
use crate::data::{CountryId, Flow, Period, SourceId, ValuationBasis};
use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub general: GeneralConfig,
    pub logging: LoggingConfig,
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub discrepancy: DiscrepancySection,
    #[serde(default)]
    pub breaks: BreaksConfig,
    /// USD per EUR, keyed by year
    pub exchange_rates: BTreeMap<String, f64>,
    #[serde(default)]
    pub countries: CountriesConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub name: String,
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub output: String,
    #[serde(default)]
    pub file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub eval_year: i32,
    #[serde(default)]
    pub reference_window_start: Option<i32>,
    #[serde(default)]
    pub reference_window_end: Option<i32>,
    pub z_score_threshold: f64,
    pub min_growth_pct: f64,
    pub min_volume_eur: f64,
    #[serde(default)]
    pub std_dev: StdDevKind,
    #[serde(default)]
    pub baseline_policy: BaselinePolicy,
    #[serde(default = "default_flow")]
    pub flow: Flow,
    /// Reporters whose flows are summed per partner; all when empty
    #[serde(default)]
    pub reporters: Vec<String>,
    #[serde(default)]
    pub meta_partners: MetaPartners,
    #[serde(default)]
    pub valuation: Option<ValuationBasis>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscrepancySection {
    #[serde(default)]
    pub partners: Vec<String>,
    #[serde(default)]
    pub scope: ReporterScope,
    pub significance_pct: f64,
}

impl Default for DiscrepancySection {
    fn default() -> Self {
        Self {
            partners: Vec::new(),
            scope: ReporterScope::Members,
            significance_pct: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreaksConfig {
    pub enabled: bool,
    pub break_period: String,
    pub alpha: f64,
}

impl Default for BreaksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            break_period: "2022-03".to_string(),
            alpha: 0.05,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CountriesConfig {
    /// Extra `label = "Canonical name"` pairs on top of the built-in table
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub id: SourceId,
    /// Files, or directories whose `.csv` files are all read
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub first_year: Option<i32>,
    #[serde(default)]
    pub last_year: Option<i32>,
}

fn default_flow() -> Flow {
    Flow::Export
}

impl Config {
    /// Load configuration from a TOML file, with `TRADEWATCH__SECTION__KEY`
    /// environment variables taking precedence
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path))
            .add_source(
                config::Environment::with_prefix("TRADEWATCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("reading {}", path.display()))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse TOML text directly, without environment overrides
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variable or default path
    pub fn load() -> Result<Self> {
        let path = std::env::var("CONFIG_FILE")
            .unwrap_or_else(|_| "config/default.toml".to_string());
        Self::from_file(path)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.output.as_str(), "pretty" | "json") {
            bail!("logging.output must be \"pretty\" or \"json\", got {:?}", self.logging.output);
        }

        self.rate_table()?;

        let a = &self.analysis;
        if let (Some(start), Some(end)) = (a.reference_window_start, a.reference_window_end) {
            if start > end {
                bail!("reference window starts after it ends ({} > {})", start, end);
            }
        }
        for (name, value) in [
            ("z_score_threshold", a.z_score_threshold),
            ("min_growth_pct", a.min_growth_pct),
            ("min_volume_eur", a.min_volume_eur),
        ] {
            if !value.is_finite() {
                bail!("analysis.{} must be finite", name);
            }
        }
        if a.min_volume_eur < 0.0 {
            bail!("analysis.min_volume_eur must not be negative");
        }

        let significance = self.discrepancy.significance_pct;
        if significance.is_nan() || significance < 0.0 {
            bail!("discrepancy.significance_pct must be a non-negative number");
        }

        self.break_config()?;

        for source in &self.sources {
            if source.paths.is_empty() {
                bail!("source {} has no paths", source.id);
            }
            if let (Some(first), Some(last)) = (source.first_year, source.last_year) {
                if first > last {
                    bail!("source {} year range is reversed ({} > {})", source.id, first, last);
                }
            }
        }

        Ok(())
    }

    pub fn rate_table(&self) -> Result<ExchangeRateTable> {
        let mut rates = ExchangeRateTable::default();
        for (year, rate) in &self.exchange_rates {
            let year: i32 = year
                .trim()
                .parse()
                .map_err(|_| anyhow!("exchange rate key {:?} is not a year", year))?;
            if !rate.is_finite() || *rate <= 0.0 {
                bail!("exchange rate for {} must be positive, got {}", year, rate);
            }
            rates.insert(year, *rate);
        }
        Ok(rates)
    }

    pub fn country_table(&self) -> Result<CountryTable> {
        let mut table = CountryTable::with_defaults();
        table.extend(&self.countries.aliases)?;
        Ok(table)
    }

    pub fn detection_config(&self) -> DetectionConfig {
        let a = &self.analysis;
        DetectionConfig {
            eval_year: a.eval_year,
            z_threshold: a.z_score_threshold,
            min_growth_pct: a.min_growth_pct,
            min_volume_eur: a.min_volume_eur,
            baseline: BaselineConfig {
                window_start: a.reference_window_start,
                window_end: a.reference_window_end,
                std_dev: a.std_dev,
                policy: a.baseline_policy,
                min_observations: 2,
            },
        }
    }

    /// Records the anomaly and break analyses look at. Reporter names go
    /// through the same alias table as the data.
    pub fn analysis_filter(&self, countries: &CountryTable) -> StoreFilter {
        let a = &self.analysis;
        let mut filter = StoreFilter::flow(a.flow);
        if !a.reporters.is_empty() {
            filter = filter.with_reporters(resolve_all(countries, &a.reporters));
        }
        if let Some(valuation) = a.valuation {
            filter = filter.with_valuation(valuation);
        }
        filter.meta_partners = a.meta_partners;
        filter
    }

    pub fn discrepancy_config(&self, countries: &CountryTable) -> DiscrepancyConfig {
        DiscrepancyConfig {
            partners: resolve_all(countries, &self.discrepancy.partners),
            scope: self.discrepancy.scope,
            significance_pct: self.discrepancy.significance_pct,
        }
    }

    pub fn break_config(&self) -> Result<BreakConfig> {
        let break_period = Period::parse(&self.breaks.break_period)
            .with_context(|| "breaks.break_period")?;
        if !break_period.is_monthly() {
            bail!("breaks.break_period must name a month, got {}", break_period);
        }
        if !(self.breaks.alpha > 0.0 && self.breaks.alpha < 1.0) {
            bail!("breaks.alpha must lie in (0, 1)");
        }
        Ok(BreakConfig {
            break_period,
            alpha: self.breaks.alpha,
        })
    }
}

fn resolve_all(countries: &CountryTable, labels: &[String]) -> Vec<CountryId> {
    labels.iter().map(|l| countries.resolve(l).id).collect()
}
