use crate::data::CountryId;
use crate::error::StatisticalUndefined;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

/// Standard deviation estimator used for the baseline spread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StdDevKind {
    /// Divide by n
    #[default]
    Population,
    /// Divide by n - 1
    Sample,
}

/// Whether the transition being scored may sit inside its own baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselinePolicy {
    #[default]
    ExcludeEvaluation,
    IncludeEvaluation,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// First ending year admitted into the window; earliest available when unset
    pub window_start: Option<i32>,
    /// Last ending year admitted. When unset, the evaluation year under
    /// `IncludeEvaluation` and the year before it otherwise.
    pub window_end: Option<i32>,
    pub std_dev: StdDevKind,
    pub policy: BaselinePolicy,
    pub min_observations: usize,
}

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            window_start: None,
            window_end: None,
            std_dev: StdDevKind::Population,
            policy: BaselinePolicy::ExcludeEvaluation,
            min_observations: 2,
        }
    }
}

/// Year-over-year change ending in `to_year`
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GrowthObservation {
    pub from_year: i32,
    pub to_year: i32,
    /// `None` when the earlier value is zero
    pub growth_pct: Option<f64>,
}

/// Historical growth profile of one partner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Baseline {
    pub partner: CountryId,
    pub window_start: i32,
    pub window_end: i32,
    pub observations: usize,
    pub mean_growth_pct: f64,
    pub std_growth_pct: f64,
}

/// Percent change from `prev` to `next`, undefined when `prev` is zero
pub fn growth_pct(prev: f64, next: f64) -> Option<f64> {
    if prev == 0.0 || !prev.is_finite() || !next.is_finite() {
        return None;
    }
    let growth = (next - prev) / prev * 100.0;
    growth.is_finite().then_some(growth)
}

/// Computes growth series and baselines over annual partner series
#[derive(Debug, Clone, Default)]
pub struct GrowthEngine {
    config: BaselineConfig,
}

impl GrowthEngine {
    pub fn new(config: BaselineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BaselineConfig {
        &self.config
    }

    /// Growth for every pair of consecutive years present in the series.
    ///
    /// A missing year breaks the chain: no growth is reported across a gap.
    pub fn growth_series(&self, series: &BTreeMap<i32, f64>) -> Vec<GrowthObservation> {
        series
            .iter()
            .zip(series.iter().skip(1))
            .filter(|((y0, _), (y1, _))| **y1 == **y0 + 1)
            .map(|((y0, v0), (y1, v1))| GrowthObservation {
                from_year: *y0,
                to_year: *y1,
                growth_pct: growth_pct(*v0, *v1),
            })
            .collect()
    }

    /// Growth of the transition into `eval_year`
    pub fn evaluation_growth(&self, series: &BTreeMap<i32, f64>, eval_year: i32) -> Option<f64> {
        let prev = series.get(&(eval_year - 1))?;
        let next = series.get(&eval_year)?;
        growth_pct(*prev, *next)
    }

    /// Baseline of a partner's growth, scored against `eval_year`.
    ///
    /// # Arguments
    /// * `partner` - Partner the series belongs to
    /// * `series` - Annual EUR values keyed by year
    /// * `eval_year` - Ending year of the transition being evaluated
    pub fn baseline(
        &self,
        partner: &CountryId,
        series: &BTreeMap<i32, f64>,
        eval_year: i32,
    ) -> Result<Baseline, StatisticalUndefined> {
        let first_year = series.keys().next().copied().unwrap_or(eval_year);
        let window_start = self.config.window_start.unwrap_or(first_year);
        let window_end = self.config.window_end.unwrap_or(match self.config.policy {
            BaselinePolicy::IncludeEvaluation => eval_year,
            BaselinePolicy::ExcludeEvaluation => eval_year - 1,
        });

        let growths: Vec<f64> = self
            .growth_series(series)
            .into_iter()
            .filter(|o| o.to_year >= window_start && o.to_year <= window_end)
            .filter(|o| self.config.policy == BaselinePolicy::IncludeEvaluation || o.to_year != eval_year)
            .filter_map(|o| o.growth_pct)
            .collect();

        if growths.len() < self.config.min_observations.max(2) {
            return Err(StatisticalUndefined::InsufficientObservations {
                found: growths.len(),
            });
        }

        let mean = growths.iter().mean();
        let std = match self.config.std_dev {
            StdDevKind::Population => growths.iter().population_std_dev(),
            StdDevKind::Sample => growths.iter().std_dev(),
        };

        Ok(Baseline {
            partner: partner.clone(),
            window_start,
            window_end,
            observations: growths.len(),
            mean_growth_pct: mean,
            std_growth_pct: std,
        })
    }
}
