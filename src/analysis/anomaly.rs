use crate::analysis::growth::{Baseline, BaselineConfig, GrowthEngine};
use crate::data::CountryId;
use crate::error::StatisticalUndefined;
use serde::{Deserialize, Serialize};
use statrs::function::erf::erfc;
use std::collections::BTreeMap;

/// Detection thresholds. Every variant of the analysis is a configuration
/// of the same detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Ending year of the transition being scored
    pub eval_year: i32,
    pub z_threshold: f64,
    pub min_growth_pct: f64,
    pub min_volume_eur: f64,
    pub baseline: BaselineConfig,
}

impl DetectionConfig {
    pub fn for_year(eval_year: i32) -> Self {
        Self {
            eval_year,
            z_threshold: 1.96,
            min_growth_pct: 50.0,
            min_volume_eur: 1e8,
            baseline: BaselineConfig::default(),
        }
    }
}

/// Score of one partner for the evaluation transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyResult {
    pub partner: CountryId,
    pub eval_year: i32,
    pub growth_pct: f64,
    pub z_score: f64,
    /// Two-sided p-value of the z-score under a standard normal
    pub p_value: f64,
    pub volume_eur: f64,
    pub baseline_mean_pct: f64,
    pub baseline_std_pct: f64,
    pub flagged: bool,
}

/// Partner left out of the ranking and the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UndefinedScore {
    pub partner: CountryId,
    #[serde(flatten)]
    pub reason: StatisticalUndefined,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub eval_year: i32,
    /// Every defined score, z descending
    pub ranked: Vec<AnomalyResult>,
    pub baselines: Vec<Baseline>,
    pub undefined: Vec<UndefinedScore>,
}

impl AnomalyReport {
    /// Flagged subset, in ranking order
    pub fn flagged(&self) -> impl Iterator<Item = &AnomalyResult> {
        self.ranked.iter().filter(|r| r.flagged)
    }

    pub fn flagged_count(&self) -> usize {
        self.flagged().count()
    }

    pub fn get(&self, partner: &CountryId) -> Option<&AnomalyResult> {
        self.ranked.iter().find(|r| &r.partner == partner)
    }
}

/// Growth anomaly detector
///
/// Scores the growth into the evaluation year against each partner's own
/// history:
/// 1. Baseline mean and std-dev of past growth inside the reference window
/// 2. z = (growth - mean) / std
/// 3. Flag when z, growth and volume all clear their thresholds
pub struct AnomalyDetector {
    config: DetectionConfig,
    engine: GrowthEngine,
}

impl AnomalyDetector {
    pub fn new(config: DetectionConfig) -> Self {
        let engine = GrowthEngine::new(config.baseline.clone());
        Self { config, engine }
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Score every partner series and rank the defined scores
    pub fn detect(&self, series: &BTreeMap<CountryId, BTreeMap<i32, f64>>) -> AnomalyReport {
        let mut report = AnomalyReport {
            eval_year: self.config.eval_year,
            ..AnomalyReport::default()
        };

        for (partner, values) in series {
            let baseline = match self.engine.baseline(partner, values, self.config.eval_year) {
                Ok(baseline) => baseline,
                Err(reason) => {
                    report.undefined.push(UndefinedScore {
                        partner: partner.clone(),
                        reason,
                    });
                    continue;
                }
            };

            match self.score(&baseline, values) {
                Ok(result) => report.ranked.push(result),
                Err(reason) => report.undefined.push(UndefinedScore {
                    partner: partner.clone(),
                    reason,
                }),
            }
            report.baselines.push(baseline);
        }

        report.ranked.sort_by(|a, b| {
            b.z_score
                .total_cmp(&a.z_score)
                .then_with(|| a.partner.cmp(&b.partner))
        });
        report
    }

    /// Score one partner against an already computed baseline
    pub fn score(
        &self,
        baseline: &Baseline,
        series: &BTreeMap<i32, f64>,
    ) -> Result<AnomalyResult, StatisticalUndefined> {
        let growth = self
            .engine
            .evaluation_growth(series, self.config.eval_year)
            .ok_or(StatisticalUndefined::UndefinedEvaluationGrowth)?;

        if baseline.std_growth_pct < 1e-9 {
            return Err(StatisticalUndefined::ZeroVariance);
        }

        let z_score = (growth - baseline.mean_growth_pct) / baseline.std_growth_pct;
        let volume_eur = series.get(&self.config.eval_year).copied().unwrap_or(0.0);

        let flagged = z_score > self.config.z_threshold
            && growth > self.config.min_growth_pct
            && volume_eur > self.config.min_volume_eur;

        Ok(AnomalyResult {
            partner: baseline.partner.clone(),
            eval_year: self.config.eval_year,
            growth_pct: growth,
            z_score,
            p_value: two_sided_p(z_score),
            volume_eur,
            baseline_mean_pct: baseline.mean_growth_pct,
            baseline_std_pct: baseline.std_growth_pct,
            flagged,
        })
    }
}

/// P(|Z| >= |z|) for a standard normal Z
pub fn two_sided_p(z: f64) -> f64 {
    erfc(z.abs() / std::f64::consts::SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grow(start: f64, growths: &[f64], first_year: i32) -> BTreeMap<i32, f64> {
        let mut series = BTreeMap::new();
        let mut value = start;
        series.insert(first_year, value);
        for (i, g) in growths.iter().enumerate() {
            value *= 1.0 + g / 100.0;
            series.insert(first_year + i as i32 + 1, value);
        }
        series
    }

    #[test]
    fn test_reference_baseline_is_flagged() {
        // baseline growths 10, 12, 8 then a 344.8% jump above 1e8 EUR
        let mut series = BTreeMap::new();
        series.insert(CountryId::from("Kyrgyzstan"), grow(1e8, &[10.0, 12.0, 8.0, 344.8], 2018));

        let report = AnomalyDetector::new(DetectionConfig::for_year(2022)).detect(&series);
        let result = &report.ranked[0];

        assert!((result.growth_pct - 344.8).abs() < 1e-6);
        assert!(result.z_score > 1.96);
        assert!(result.volume_eur > 1e8);
        assert!(result.flagged);
        assert!(result.p_value < 0.05);
        assert_eq!(report.flagged_count(), 1);
    }

    #[test]
    fn test_small_volume_not_flagged() {
        let mut series = BTreeMap::new();
        series.insert(CountryId::from("Armenia"), grow(1e3, &[10.0, 12.0, 8.0, 344.8], 2018));

        let report = AnomalyDetector::new(DetectionConfig::for_year(2022)).detect(&series);
        assert_eq!(report.ranked.len(), 1);
        assert!(!report.ranked[0].flagged);
        assert_eq!(report.flagged().count(), 0);
    }

    #[test]
    fn test_ranking_is_z_descending() {
        let mut series = BTreeMap::new();
        series.insert(CountryId::from("A"), grow(1e9, &[10.0, 12.0, 8.0, 20.0], 2018));
        series.insert(CountryId::from("B"), grow(1e9, &[10.0, 12.0, 8.0, 90.0], 2018));
        series.insert(CountryId::from("C"), grow(1e9, &[10.0, 12.0, 8.0, -30.0], 2018));

        let report = AnomalyDetector::new(DetectionConfig::for_year(2022)).detect(&series);
        let order: Vec<&str> = report.ranked.iter().map(|r| r.partner.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
        assert_eq!(report.baselines.len(), 3);
    }

    #[test]
    fn test_undefined_reasons() {
        let mut series = BTreeMap::new();
        // zero prior-year value
        let mut zero_prior = grow(100.0, &[10.0, 12.0], 2018);
        zero_prior.insert(2021, 0.0);
        zero_prior.insert(2022, 50.0);
        series.insert(CountryId::from("ZeroPrior"), zero_prior);
        // constant growth
        series.insert(CountryId::from("Flat"), grow(100.0, &[10.0, 10.0, 10.0, 80.0], 2018));
        // one observation only
        series.insert(CountryId::from("Short"), grow(100.0, &[10.0, 80.0], 2020));

        let report = AnomalyDetector::new(DetectionConfig::for_year(2022)).detect(&series);
        assert!(report.ranked.is_empty());

        let reason = |name: &str| {
            report
                .undefined
                .iter()
                .find(|u| u.partner.as_str() == name)
                .map(|u| u.reason)
        };
        assert_eq!(reason("ZeroPrior"), Some(StatisticalUndefined::UndefinedEvaluationGrowth));
        assert_eq!(reason("Flat"), Some(StatisticalUndefined::ZeroVariance));
        assert_eq!(
            reason("Short"),
            Some(StatisticalUndefined::InsufficientObservations { found: 1 })
        );
    }

    #[test]
    fn test_p_value() {
        assert!((two_sided_p(1.96) - 0.05).abs() < 1e-3);
        assert!((two_sided_p(0.0) - 1.0).abs() < 1e-12);
        assert_eq!(two_sided_p(-2.5), two_sided_p(2.5));
    }
}
