//! Query service over one immutable trade snapshot.
//!
//! Anomaly requests are memoized by their exact parameters, so asking the
//! same question twice returns the same report without recomputing it. The
//! snapshot never changes, which keeps every request idempotent. The memo
//! holds at most `memo_limit` reports; a full memo is emptied before the
//! next report is stored.

use crate::aggregate::{StoreFilter, TradeStore};
use crate::analysis::{
    AnomalyDetector, AnomalyReport, BaselineConfig, BreakConfig, BreakDetector, BreakReport,
    DetectionConfig, DiscrepancyConfig, DiscrepancyEngine, DiscrepancyRecord,
};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default number of memoized anomaly reports
pub const DEFAULT_MEMO_LIMIT: usize = 256;

/// Exact parameters of one anomaly request.
///
/// Thresholds are keyed by their bit pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RequestKey {
    eval_year: i32,
    z_threshold: u64,
    min_growth_pct: u64,
    min_volume_eur: u64,
    baseline: BaselineConfig,
    filter: StoreFilter,
}

impl RequestKey {
    fn new(config: &DetectionConfig, filter: &StoreFilter) -> Self {
        Self {
            eval_year: config.eval_year,
            z_threshold: config.z_threshold.to_bits(),
            min_growth_pct: config.min_growth_pct.to_bits(),
            min_volume_eur: config.min_volume_eur.to_bits(),
            baseline: config.baseline.clone(),
            filter: filter.clone(),
        }
    }
}

/// Memo statistics
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
}

impl ServiceStats {
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let total = hits + self.misses.load(Ordering::Relaxed);
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Thread-safe analysis entry point for repeated queries
pub struct AnalysisService {
    snapshot: Arc<TradeStore>,
    anomalies: DashMap<RequestKey, Arc<AnomalyReport>>,
    memo_limit: usize,
    stats: ServiceStats,
}

impl AnalysisService {
    pub fn new(store: TradeStore) -> Self {
        Self::from_snapshot(Arc::new(store))
    }

    pub fn from_snapshot(snapshot: Arc<TradeStore>) -> Self {
        Self {
            snapshot,
            anomalies: DashMap::new(),
            memo_limit: DEFAULT_MEMO_LIMIT,
            stats: ServiceStats::default(),
        }
    }

    /// Cap the memo at `limit` reports (at least one)
    pub fn with_memo_limit(mut self, limit: usize) -> Self {
        self.memo_limit = limit.max(1);
        self
    }

    pub fn snapshot(&self) -> Arc<TradeStore> {
        self.snapshot.clone()
    }

    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    /// Number of distinct anomaly requests answered so far
    pub fn memoized(&self) -> usize {
        self.anomalies.len()
    }

    /// Drop every memoized report. Statistics are kept.
    pub fn clear(&self) {
        self.anomalies.clear();
    }

    /// Ranked anomalies for one detector configuration and record filter
    pub fn anomalies(&self, config: &DetectionConfig, filter: &StoreFilter) -> Arc<AnomalyReport> {
        let key = RequestKey::new(config, filter);
        if let Some(report) = self.anomalies.get(&key) {
            self.stats.hits.fetch_add(1, Ordering::Relaxed);
            return report.clone();
        }

        self.stats.misses.fetch_add(1, Ordering::Relaxed);
        let series = self.snapshot.annual_by_partner(filter);
        let report = Arc::new(AnomalyDetector::new(config.clone()).detect(&series));
        debug!(
            "Computed anomalies for {} over {} partner(s)",
            config.eval_year,
            series.len()
        );

        if self.anomalies.len() >= self.memo_limit {
            debug!("Anomaly memo full at {} report(s), clearing", self.anomalies.len());
            self.anomalies.clear();
        }

        // a concurrent request for the same key may have finished first; keep its report
        self.anomalies.entry(key).or_insert(report).clone()
    }

    pub fn discrepancies(&self, config: &DiscrepancyConfig) -> Vec<DiscrepancyRecord> {
        DiscrepancyEngine::new(config.clone()).compare(&self.snapshot)
    }

    pub fn breaks(&self, config: &BreakConfig, filter: &StoreFilter) -> BreakReport {
        let monthly = self.snapshot.monthly_by_partner(filter);
        BreakDetector::new(config.clone()).run(&monthly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CountryTable;
    use crate::data::{Flow, Period, SourceId, TradeRecord};

    fn record(partner: &str, year: i32, value: f64) -> TradeRecord {
        TradeRecord {
            reporter: "Germany".into(),
            partner: partner.into(),
            flow: Flow::Export,
            period: Period::Year(year),
            value_eur: value,
            source: SourceId::Eurostat,
            valuation: None,
        }
    }

    fn service() -> AnalysisService {
        let mut records = Vec::new();
        for (i, v) in [100.0, 110.0, 123.2, 133.056, 600.0].iter().enumerate() {
            records.push(record("Kyrgyzstan", 2018 + i as i32, v * 1e6));
            records.push(record("Armenia", 2018 + i as i32, v * 1e3));
        }
        let countries = Arc::new(CountryTable::with_defaults());
        AnalysisService::new(TradeStore::from_records(countries, &records))
    }

    #[test]
    fn test_repeated_request_hits_memo() {
        let service = service();
        let config = DetectionConfig::for_year(2022);
        let filter = StoreFilter::flow(Flow::Export);

        let first = service.anomalies(&config, &filter);
        let second = service.anomalies(&config, &filter);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(service.memoized(), 1);
        assert_eq!(service.stats().hits.load(Ordering::Relaxed), 1);
        assert!((service.stats().hit_ratio() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_distinct_parameters_are_distinct_requests() {
        let service = service();
        let filter = StoreFilter::flow(Flow::Export);
        let strict = DetectionConfig {
            z_threshold: 3.0,
            ..DetectionConfig::for_year(2022)
        };

        let loose = service.anomalies(&DetectionConfig::for_year(2022), &filter);
        let tight = service.anomalies(&strict, &filter);
        let partner_only = service.anomalies(
            &DetectionConfig::for_year(2022),
            &filter.clone().with_partners(vec!["Armenia".into()]),
        );

        assert_eq!(service.memoized(), 3);
        assert!(!Arc::ptr_eq(&loose, &tight));
        assert_eq!(loose.ranked.len(), tight.ranked.len());
        assert_eq!(partner_only.ranked.len(), 1);
        assert_eq!(partner_only.ranked[0].partner.as_str(), "Armenia");
    }

    #[test]
    fn test_concurrent_requests_are_idempotent() {
        let service = service();
        let config = DetectionConfig::for_year(2022);
        let filter = StoreFilter::flow(Flow::Export);

        let reports: Vec<Arc<AnomalyReport>> = crossbeam::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|_| service.anomalies(&config, &filter)))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        })
        .unwrap();

        assert!(reports.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(service.memoized(), 1);
    }

    #[test]
    fn test_clear_empties_memo() {
        let service = service();
        let config = DetectionConfig::for_year(2022);
        let filter = StoreFilter::flow(Flow::Export);

        let before = service.anomalies(&config, &filter);
        service.clear();
        assert_eq!(service.memoized(), 0);

        let after = service.anomalies(&config, &filter);
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(before, after);
        assert_eq!(service.stats().misses.load(Ordering::Relaxed), 2);
        assert_eq!(service.stats().hits.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_memo_never_exceeds_limit() {
        let service = service().with_memo_limit(2);
        let filter = StoreFilter::flow(Flow::Export);

        for year in 2019..=2022 {
            service.anomalies(&DetectionConfig::for_year(year), &filter);
            assert!(service.memoized() <= 2);
        }
        // the latest request survives the eviction
        service.anomalies(&DetectionConfig::for_year(2022), &filter);
        assert_eq!(service.stats().hits.load(Ordering::Relaxed), 1);
    }
}
