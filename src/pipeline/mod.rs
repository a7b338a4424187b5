pub mod diagnostics;
pub mod engine;
pub mod report;
pub mod service;

pub use diagnostics::{Diagnostics, FileFailure, FileSummary, RejectedRow};
pub use engine::{analyze, AnalysisSettings, Ingested, Pipeline, RunOutput, SourceInput};
pub use report::{export, write_csv, write_records};
pub use service::{AnalysisService, ServiceStats, DEFAULT_MEMO_LIMIT};
