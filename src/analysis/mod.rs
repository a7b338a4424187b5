pub mod anomaly;
pub mod breaks;
pub mod discrepancy;
pub mod growth;

pub use anomaly::{AnomalyDetector, AnomalyReport, AnomalyResult, DetectionConfig, UndefinedScore};
pub use breaks::{BreakConfig, BreakDetector, BreakReport, BreakTestResult};
pub use discrepancy::{
    DiscrepancyConfig, DiscrepancyEngine, DiscrepancyRecord, ReporterScope, Rollup, RollupKey,
    SortOrder,
};
pub use growth::{
    growth_pct, Baseline, BaselineConfig, BaselinePolicy, GrowthEngine, GrowthObservation,
    StdDevKind,
};
