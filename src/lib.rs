pub mod aggregate;
pub mod analysis;
pub mod canonical;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use aggregate::{GroupKey, MetaPartners, StoreFilter, TradeStore};
pub use analysis::{
    AnomalyDetector, AnomalyReport, AnomalyResult, BreakDetector, DetectionConfig,
    DiscrepancyEngine, DiscrepancyRecord, GrowthEngine,
};
pub use canonical::{Canonicalizer, CountryTable, ExchangeRateTable};
pub use data::{CountryId, Flow, Period, RawRecord, SourceId, TradeRecord};
pub use error::{CanonicalizeError, LayoutError, ParseError, PipelineError, StatisticalUndefined};
pub use pipeline::{AnalysisService, Pipeline, RunOutput, SourceInput};
pub use sources::{SourceAdapter, TableAdapter};
pub use utils::Config;
