use crate::aggregate::{eu_aggregate_id, EuSide, GroupKey, GroupValue, StoreFilter, TradeStore};
use crate::data::{CountryId, Flow, ValuationBasis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which side of the EU is compared against the partner's own figures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReporterScope {
    /// One comparison per EU member state
    #[default]
    Members,
    /// One comparison against the EU-27 total
    EuAggregate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyConfig {
    /// Partners reporting their own imports; every national reporter when empty
    pub partners: Vec<CountryId>,
    pub scope: ReporterScope,
    /// |discrepancy_pct| above this is significant
    pub significance_pct: f64,
}

impl Default for DiscrepancyConfig {
    fn default() -> Self {
        Self {
            partners: Vec::new(),
            scope: ReporterScope::Members,
            significance_pct: 10.0,
        }
    }
}

/// EU-reported exports to a partner next to the partner's reported imports
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscrepancyRecord {
    pub reporter: CountryId,
    pub partner: CountryId,
    pub year: i32,
    pub eurostat_value_eur: f64,
    pub national_value_eur: f64,
    pub valuation_basis: Option<ValuationBasis>,
    pub discrepancy_eur: f64,
    /// Relative to the Eurostat figure; undefined when that is zero
    pub discrepancy_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum RollupKey {
    Reporter(CountryId),
    Year(i32),
}

/// Discrepancies summed along one dimension, per valuation basis
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollup {
    pub key: RollupKey,
    pub valuation_basis: Option<ValuationBasis>,
    pub eurostat_value_eur: f64,
    pub national_value_eur: f64,
    pub discrepancy_eur: f64,
    pub discrepancy_pct: Option<f64>,
}

/// `(eurostat − national, (eurostat − national) / eurostat × 100)`
pub fn discrepancy(eurostat: f64, national: f64) -> (f64, Option<f64>) {
    let diff = eurostat - national;
    let pct = (eurostat != 0.0).then(|| diff / eurostat * 100.0);
    (diff, pct)
}

pub struct DiscrepancyEngine {
    config: DiscrepancyConfig,
}

impl DiscrepancyEngine {
    pub fn new(config: DiscrepancyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DiscrepancyConfig {
        &self.config
    }

    /// Align Eurostat exports with national imports for every configured partner.
    ///
    /// Only (reporter, year) pairs present on both sides are compared. Each
    /// national valuation basis yields its own record.
    pub fn compare(&self, store: &TradeStore) -> Vec<DiscrepancyRecord> {
        let partners = if self.config.partners.is_empty() {
            national_reporters(store)
        } else {
            self.config.partners.clone()
        };

        let mut records = Vec::new();
        for partner in &partners {
            let (mirror, national) = match self.config.scope {
                ReporterScope::Members => member_sides(store, partner),
                ReporterScope::EuAggregate => aggregate_sides(store, partner),
            };

            for ((reporter, year, basis), national_value) in national {
                let Some(eurostat_value) = mirror.get(&(reporter.clone(), year)).copied() else {
                    continue;
                };
                let (diff, pct) = discrepancy(eurostat_value, national_value);
                records.push(DiscrepancyRecord {
                    reporter,
                    partner: partner.clone(),
                    year,
                    eurostat_value_eur: eurostat_value,
                    national_value_eur: national_value,
                    valuation_basis: basis,
                    discrepancy_eur: diff,
                    discrepancy_pct: pct,
                });
            }
        }

        tracing::debug!(
            "{} discrepancy records for {} partner(s)",
            records.len(),
            partners.len()
        );
        records
    }

    /// Records whose relative discrepancy exceeds the configured threshold
    pub fn significant<'a>(&self, records: &'a [DiscrepancyRecord]) -> Vec<&'a DiscrepancyRecord> {
        significant(records, self.config.significance_pct)
    }
}

pub fn significant(records: &[DiscrepancyRecord], threshold_pct: f64) -> Vec<&DiscrepancyRecord> {
    records
        .iter()
        .filter(|r| r.discrepancy_pct.map_or(false, |p| p.abs() > threshold_pct))
        .collect()
}

/// Per reporter across all years
pub fn by_reporter(records: &[DiscrepancyRecord]) -> Vec<Rollup> {
    rollup(records, |r| RollupKey::Reporter(r.reporter.clone()))
}

/// Per year across all reporters
pub fn by_year(records: &[DiscrepancyRecord]) -> Vec<Rollup> {
    rollup(records, |r| RollupKey::Year(r.year))
}

/// Order rollups by their EUR discrepancy
pub fn sorted(mut rows: Vec<Rollup>, order: SortOrder) -> Vec<Rollup> {
    rows.sort_by(|a, b| match order {
        SortOrder::Ascending => a.discrepancy_eur.total_cmp(&b.discrepancy_eur),
        SortOrder::Descending => b.discrepancy_eur.total_cmp(&a.discrepancy_eur),
    });
    rows
}

fn rollup<F>(records: &[DiscrepancyRecord], key: F) -> Vec<Rollup>
where
    F: Fn(&DiscrepancyRecord) -> RollupKey,
{
    let mut sums: BTreeMap<(RollupKey, Option<ValuationBasis>), (f64, f64)> = BTreeMap::new();
    for record in records {
        let entry = sums.entry((key(record), record.valuation_basis)).or_insert((0.0, 0.0));
        entry.0 += record.eurostat_value_eur;
        entry.1 += record.national_value_eur;
    }

    sums.into_iter()
        .map(|((key, valuation_basis), (eurostat, national))| {
            let (diff, pct) = discrepancy(eurostat, national);
            Rollup {
                key,
                valuation_basis,
                eurostat_value_eur: eurostat,
                national_value_eur: national,
                discrepancy_eur: diff,
                discrepancy_pct: pct,
            }
        })
        .collect()
}

type MirrorSide = BTreeMap<(CountryId, i32), f64>;
type NationalSide = BTreeMap<(CountryId, i32, Option<ValuationBasis>), f64>;

/// Reporters that publish imports and are not EU members themselves
fn national_reporters(store: &TradeStore) -> Vec<CountryId> {
    store
        .aggregate(&[GroupKey::Reporter], &StoreFilter::flow(Flow::Import))
        .into_keys()
        .filter_map(|key| match key.into_iter().next() {
            Some(GroupValue::Country(id)) => Some(id),
            _ => None,
        })
        .filter(|id| !store.countries().is_eu_member(id) && !store.countries().is_meta(id))
        .collect()
}

fn member_sides(store: &TradeStore, partner: &CountryId) -> (MirrorSide, NationalSide) {
    let countries = store.countries();

    let exports = StoreFilter::flow(Flow::Export).with_partners(vec![partner.clone()]);
    let mut mirror = MirrorSide::new();
    for (key, value) in store.aggregate(&[GroupKey::Reporter, GroupKey::Year], &exports) {
        if let [GroupValue::Country(reporter), GroupValue::Year(year)] = key.as_slice() {
            if countries.is_eu_member(reporter) {
                mirror.insert((reporter.clone(), *year), value);
            }
        }
    }

    let imports = StoreFilter::flow(Flow::Import).with_reporters(vec![partner.clone()]);
    let mut national = NationalSide::new();
    for (key, value) in store.aggregate(
        &[GroupKey::Partner, GroupKey::Year, GroupKey::Valuation],
        &imports,
    ) {
        if let [GroupValue::Country(reporter), GroupValue::Year(year), GroupValue::Valuation(basis)] =
            key.as_slice()
        {
            if countries.is_eu_member(reporter) {
                national.insert((reporter.clone(), *year, *basis), value);
            }
        }
    }

    (mirror, national)
}

/// EU-27 on both sides: a directly reported aggregate figure wins, the
/// member sum fills in where none was reported
fn aggregate_sides(store: &TradeStore, partner: &CountryId) -> (MirrorSide, NationalSide) {
    let eu = eu_aggregate_id(store.countries());

    let exports = StoreFilter::flow(Flow::Export).with_partners(vec![partner.clone()]);
    let mut mirror = MirrorSide::new();
    for (key, value) in store.eu_member_totals(EuSide::Reporter, &exports) {
        mirror.insert((eu.clone(), key.period.year()), value);
    }
    let direct = exports.clone().with_reporters(vec![eu.clone()]);
    for (key, value) in store.aggregate(&[GroupKey::Year], &direct) {
        if let [GroupValue::Year(year)] = key.as_slice() {
            mirror.insert((eu.clone(), *year), value);
        }
    }

    let imports = StoreFilter::flow(Flow::Import).with_reporters(vec![partner.clone()]);
    let mut national = NationalSide::new();
    for (key, value) in store.eu_member_totals(EuSide::Partner, &imports) {
        *national
            .entry((eu.clone(), key.period.year(), key.valuation))
            .or_insert(0.0) += value;
    }
    let direct = imports.with_partners(vec![eu.clone()]).retain_meta();
    for (key, value) in store.aggregate(&[GroupKey::Year, GroupKey::Valuation], &direct) {
        if let [GroupValue::Year(year), GroupValue::Valuation(basis)] = key.as_slice() {
            national.insert((eu.clone(), *year, *basis), value);
        }
    }

    (mirror, national)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CountryTable;
    use crate::data::{Period, SourceId, TradeRecord};
    use std::sync::Arc;

    fn export(reporter: &str, partner: &str, year: i32, value: f64) -> TradeRecord {
        TradeRecord {
            reporter: reporter.into(),
            partner: partner.into(),
            flow: Flow::Export,
            period: Period::Year(year),
            value_eur: value,
            source: SourceId::Eurostat,
            valuation: None,
        }
    }

    fn import(
        reporter: &str,
        partner: &str,
        year: i32,
        value: f64,
        valuation: Option<ValuationBasis>,
    ) -> TradeRecord {
        TradeRecord {
            reporter: reporter.into(),
            partner: partner.into(),
            flow: Flow::Import,
            period: Period::Year(year),
            value_eur: value,
            source: SourceId::Armenia,
            valuation,
        }
    }

    fn store(records: &[TradeRecord]) -> TradeStore {
        TradeStore::from_records(Arc::new(CountryTable::with_defaults()), records)
    }

    #[test]
    fn test_sign_and_percentage() {
        assert_eq!(discrepancy(100.0, 80.0), (20.0, Some(20.0)));
        assert_eq!(discrepancy(0.0, 5.0), (-5.0, None));

        let (a, _) = discrepancy(120.0, 75.0);
        let (b, _) = discrepancy(75.0, 120.0);
        assert_eq!(a, -b);
    }

    #[test]
    fn test_member_scope_keeps_bases_apart() {
        let s = store(&[
            export("Germany", "Armenia", 2022, 100.0),
            export("France", "Armenia", 2022, 50.0),
            import("Armenia", "Germany", 2022, 80.0, Some(ValuationBasis::Consignment)),
            import("Armenia", "Germany", 2022, 90.0, Some(ValuationBasis::Origin)),
            import("Armenia", "Italy", 2022, 10.0, Some(ValuationBasis::Origin)),
        ]);
        let records = DiscrepancyEngine::new(DiscrepancyConfig::default()).compare(&s);

        // France has no national figure and Italy no Eurostat figure
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.reporter.as_str() == "Germany"));
        let consignment = records
            .iter()
            .find(|r| r.valuation_basis == Some(ValuationBasis::Consignment))
            .unwrap();
        assert_eq!(consignment.discrepancy_eur, 20.0);
        assert_eq!(consignment.discrepancy_pct, Some(20.0));
        let origin = records
            .iter()
            .find(|r| r.valuation_basis == Some(ValuationBasis::Origin))
            .unwrap();
        assert_eq!(origin.discrepancy_eur, 10.0);
    }

    #[test]
    fn test_eu_aggregate_scope() {
        let s = store(&[
            export("Germany", "Kyrgyzstan", 2022, 300.0),
            export("Italy", "Kyrgyzstan", 2022, 100.0),
            export("United Kingdom", "Kyrgyzstan", 2022, 999.0),
            import("Kyrgyzstan", "Germany", 2022, 150.0, None),
            import("Kyrgyzstan", "Italy", 2022, 50.0, None),
            import("Kyrgyzstan", "China", 2022, 500.0, None),
        ]);
        let engine = DiscrepancyEngine::new(DiscrepancyConfig {
            partners: vec!["Kyrgyzstan".into()],
            scope: ReporterScope::EuAggregate,
            ..DiscrepancyConfig::default()
        });
        let records = engine.compare(&s);

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.reporter.as_str(), "European Union");
        assert_eq!(r.eurostat_value_eur, 400.0);
        assert_eq!(r.national_value_eur, 200.0);
        assert_eq!(r.discrepancy_pct, Some(50.0));
    }

    #[test]
    fn test_direct_eu_figures_win() {
        let s = store(&[
            export("European Union", "Kyrgyzstan", 2022, 500.0),
            export("Germany", "Kyrgyzstan", 2022, 300.0),
            import("Kyrgyzstan", "Germany", 2022, 150.0, None),
        ]);
        let engine = DiscrepancyEngine::new(DiscrepancyConfig {
            scope: ReporterScope::EuAggregate,
            ..DiscrepancyConfig::default()
        });
        let records = engine.compare(&s);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].eurostat_value_eur, 500.0);
    }

    #[test]
    fn test_rollups_and_significance() {
        let s = store(&[
            export("Germany", "Armenia", 2021, 100.0),
            export("Germany", "Armenia", 2022, 200.0),
            export("France", "Armenia", 2022, 100.0),
            import("Armenia", "Germany", 2021, 95.0, None),
            import("Armenia", "Germany", 2022, 100.0, None),
            import("Armenia", "France", 2022, 40.0, None),
        ]);
        let engine = DiscrepancyEngine::new(DiscrepancyConfig::default());
        let records = engine.compare(&s);
        assert_eq!(records.len(), 3);

        let reporters = sorted(by_reporter(&records), SortOrder::Descending);
        assert_eq!(reporters[0].key, RollupKey::Reporter("Germany".into()));
        assert_eq!(reporters[0].discrepancy_eur, 105.0);
        assert_eq!(reporters[1].discrepancy_eur, 60.0);

        let years = sorted(by_year(&records), SortOrder::Ascending);
        assert_eq!(years[0].key, RollupKey::Year(2021));
        assert_eq!(years[1].discrepancy_eur, 160.0);

        // 5% in 2021 is below the threshold
        assert_eq!(engine.significant(&records).len(), 2);
    }
}
