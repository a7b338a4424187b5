use crate::canonical::CountryTable;
use crate::data::{CountryId, Flow, Period, SourceId, TradeRecord, ValuationBasis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Identity of one stored series point.
///
/// The valuation basis is part of the key so consignment and origin figures
/// of the same flow are never summed together.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SeriesKey {
    pub reporter: CountryId,
    pub partner: CountryId,
    pub flow: Flow,
    pub period: Period,
    pub valuation: Option<ValuationBasis>,
}

impl SeriesKey {
    pub fn of(record: &TradeRecord) -> Self {
        Self {
            reporter: record.reporter.clone(),
            partner: record.partner.clone(),
            flow: record.flow,
            period: record.period,
            valuation: record.valuation,
        }
    }
}

/// Summed value of every record sharing one key
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cell {
    pub value_eur: f64,
    pub records: usize,
    pub sources: BTreeSet<SourceId>,
}

/// Dimension a rollup can group on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    Reporter,
    Partner,
    Flow,
    Year,
    Period,
    Valuation,
}

/// One component of a rollup row's key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum GroupValue {
    Country(CountryId),
    Flow(Flow),
    Year(i32),
    Period(Period),
    Valuation(Option<ValuationBasis>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetaPartners {
    /// Drop aggregate and regional partners ("European Union", "World", "Asia")
    #[default]
    Exclude,
    /// Keep them as distinct partner identities
    Retain,
}

/// Which records take part in a rollup
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StoreFilter {
    pub flow: Option<Flow>,
    pub reporters: Option<Vec<CountryId>>,
    pub partners: Option<Vec<CountryId>>,
    /// Only series with this valuation basis; `None` keeps every basis
    pub valuation: Option<ValuationBasis>,
    pub meta_partners: MetaPartners,
}

impl StoreFilter {
    pub fn flow(flow: Flow) -> Self {
        Self {
            flow: Some(flow),
            ..Self::default()
        }
    }

    pub fn with_reporters(mut self, reporters: Vec<CountryId>) -> Self {
        self.reporters = Some(reporters);
        self
    }

    pub fn with_partners(mut self, partners: Vec<CountryId>) -> Self {
        self.partners = Some(partners);
        self
    }

    pub fn with_valuation(mut self, valuation: ValuationBasis) -> Self {
        self.valuation = Some(valuation);
        self
    }

    pub fn retain_meta(mut self) -> Self {
        self.meta_partners = MetaPartners::Retain;
        self
    }

    fn accepts(&self, key: &SeriesKey, countries: &CountryTable) -> bool {
        if self.flow.map_or(false, |f| f != key.flow) {
            return false;
        }
        if let Some(reporters) = &self.reporters {
            if !reporters.contains(&key.reporter) {
                return false;
            }
        }
        if let Some(partners) = &self.partners {
            if !partners.contains(&key.partner) {
                return false;
            }
        }
        if self.valuation.is_some() && self.valuation != key.valuation {
            return false;
        }
        self.meta_partners == MetaPartners::Retain || !countries.is_meta(&key.partner)
    }
}

/// Single merged store of canonical records.
///
/// Merging is a plain sum per key, so insertion order never changes a total.
#[derive(Debug, Clone)]
pub struct TradeStore {
    cells: BTreeMap<SeriesKey, Cell>,
    countries: Arc<CountryTable>,
}

impl TradeStore {
    pub fn new(countries: Arc<CountryTable>) -> Self {
        Self {
            cells: BTreeMap::new(),
            countries,
        }
    }

    pub fn from_records<'a, I>(countries: Arc<CountryTable>, records: I) -> Self
    where
        I: IntoIterator<Item = &'a TradeRecord>,
    {
        let mut store = Self::new(countries);
        for record in records {
            store.insert(record);
        }
        store
    }

    pub fn insert(&mut self, record: &TradeRecord) {
        let cell = self.cells.entry(SeriesKey::of(record)).or_default();
        cell.value_eur += record.value_eur;
        cell.records += 1;
        cell.sources.insert(record.source);
    }

    pub fn merge(&mut self, other: &TradeStore) {
        for (key, cell) in &other.cells {
            let target = self.cells.entry(key.clone()).or_default();
            target.value_eur += cell.value_eur;
            target.records += cell.records;
            target.sources.extend(cell.sources.iter().copied());
        }
    }

    pub fn countries(&self) -> &CountryTable {
        &self.countries
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SeriesKey, &Cell)> {
        self.cells.iter()
    }

    /// Years that occur anywhere in the store
    pub fn years(&self) -> BTreeSet<i32> {
        self.cells.keys().map(|k| k.period.year()).collect()
    }

    /// Sum values by the given dimensions.
    ///
    /// Each stored point lands in exactly one group. When grouping by year
    /// without the period dimension, a series that carries both an annual
    /// figure and monthly figures for the same year contributes the annual
    /// figure only.
    ///
    /// Without the valuation dimension a reporter publishing both bases
    /// contributes one of them: consignment, unless the filter names a basis.
    pub fn aggregate(&self, group_by: &[GroupKey], filter: &StoreFilter) -> BTreeMap<Vec<GroupValue>, f64> {
        let annual = group_by.contains(&GroupKey::Year) && !group_by.contains(&GroupKey::Period);
        let bases = if group_by.contains(&GroupKey::Valuation) {
            Bases::Separate
        } else {
            Bases::Single
        };

        let points: Box<dyn Iterator<Item = (SeriesKey, f64)> + '_> = if annual {
            Box::new(self.annual_points(filter, bases).into_iter())
        } else {
            Box::new(
                self.accepted(filter, bases)
                    .map(|(key, cell)| (key.clone(), cell.value_eur)),
            )
        };

        let mut groups = BTreeMap::new();
        for (key, value) in points {
            let group: Vec<GroupValue> = group_by.iter().map(|g| group_value(&key, *g)).collect();
            *groups.entry(group).or_insert(0.0) += value;
        }
        groups
    }

    /// partner -> year -> EUR value, summed over the reporters the filter
    /// admits. One valuation basis per reporter, as in [`TradeStore::aggregate`].
    pub fn annual_by_partner(&self, filter: &StoreFilter) -> BTreeMap<CountryId, BTreeMap<i32, f64>> {
        let mut series: BTreeMap<CountryId, BTreeMap<i32, f64>> = BTreeMap::new();
        for (key, value) in self.annual_points(filter, Bases::Single) {
            *series
                .entry(key.partner)
                .or_default()
                .entry(key.period.year())
                .or_insert(0.0) += value;
        }
        series
    }

    /// partner -> month -> EUR value, monthly points only
    pub fn monthly_by_partner(&self, filter: &StoreFilter) -> BTreeMap<CountryId, BTreeMap<Period, f64>> {
        let mut series: BTreeMap<CountryId, BTreeMap<Period, f64>> = BTreeMap::new();
        for (key, cell) in self.accepted(filter, Bases::Single) {
            if !key.period.is_monthly() {
                continue;
            }
            *series
                .entry(key.partner.clone())
                .or_default()
                .entry(key.period)
                .or_insert(0.0) += cell.value_eur;
        }
        series
    }

    /// Annual totals over EU-27 members on one side of the flow.
    ///
    /// `EuSide::Partner` rolls a reporter's partners up into one
    /// "European Union" partner; `EuSide::Reporter` does the same for
    /// reporting member states. The result is keyed like the store, with
    /// the EU aggregate in place of the members and annual periods.
    pub fn eu_member_totals(&self, side: EuSide, filter: &StoreFilter) -> BTreeMap<SeriesKey, f64> {
        let eu = eu_aggregate_id(&self.countries);
        let mut totals = BTreeMap::new();
        let filter = StoreFilter {
            meta_partners: MetaPartners::Exclude,
            ..filter.clone()
        };

        for (mut key, value) in self.annual_points(&filter, Bases::Separate) {
            match side {
                EuSide::Partner if self.countries.is_eu_member(&key.partner) => key.partner = eu.clone(),
                EuSide::Reporter if self.countries.is_eu_member(&key.reporter) => key.reporter = eu.clone(),
                _ => continue,
            }
            *totals.entry(key).or_insert(0.0) += value;
        }
        totals
    }

    /// Cells the filter admits.
    ///
    /// With `Bases::Single` and no basis named by the filter, origin cells
    /// are dropped for every (reporter, flow) that also publishes consignment.
    fn accepted<'a>(
        &'a self,
        filter: &'a StoreFilter,
        bases: Bases,
    ) -> impl Iterator<Item = (&'a SeriesKey, &'a Cell)> + 'a {
        let single = bases == Bases::Single && filter.valuation.is_none();
        let with_consignment: BTreeSet<(&CountryId, Flow)> = if single {
            self.cells
                .keys()
                .filter(|k| k.valuation == Some(ValuationBasis::Consignment))
                .map(|k| (&k.reporter, k.flow))
                .collect()
        } else {
            BTreeSet::new()
        };

        self.cells.iter().filter(move |(key, _)| {
            filter.accepts(key, &self.countries)
                && !(key.valuation == Some(ValuationBasis::Origin)
                    && with_consignment.contains(&(&key.reporter, key.flow)))
        })
    }

    /// Filtered points collapsed to years, annual figures winning over months
    fn annual_points(&self, filter: &StoreFilter, bases: Bases) -> BTreeMap<SeriesKey, f64> {
        let mut annual: BTreeMap<SeriesKey, f64> = BTreeMap::new();
        let mut monthly: BTreeMap<SeriesKey, f64> = BTreeMap::new();

        for (key, cell) in self.accepted(filter, bases) {
            let year_key = SeriesKey {
                period: key.period.to_year(),
                ..key.clone()
            };
            let target = if key.period.is_monthly() { &mut monthly } else { &mut annual };
            *target.entry(year_key).or_insert(0.0) += cell.value_eur;
        }

        for (key, value) in monthly {
            annual.entry(key).or_insert(value);
        }
        annual
    }
}

/// Whether a rollup keeps valuation bases apart or settles on one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bases {
    Separate,
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EuSide {
    Reporter,
    Partner,
}

/// Canonical identity of the EU-27 aggregate
pub fn eu_aggregate_id(countries: &CountryTable) -> CountryId {
    countries.resolve("European Union").id
}

fn group_value(key: &SeriesKey, group: GroupKey) -> GroupValue {
    match group {
        GroupKey::Reporter => GroupValue::Country(key.reporter.clone()),
        GroupKey::Partner => GroupValue::Country(key.partner.clone()),
        GroupKey::Flow => GroupValue::Flow(key.flow),
        GroupKey::Year => GroupValue::Year(key.period.year()),
        GroupKey::Period => GroupValue::Period(key.period),
        GroupKey::Valuation => GroupValue::Valuation(key.valuation),
    }
}
