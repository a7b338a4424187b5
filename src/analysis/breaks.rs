use crate::data::{CountryId, Period};
use crate::error::StatisticalUndefined;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::statistics::Statistics;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakConfig {
    /// First period of the "after" sample
    pub break_period: Period,
    pub alpha: f64,
}

impl Default for BreakConfig {
    fn default() -> Self {
        Self {
            break_period: Period::Month { year: 2022, month: 3 },
            alpha: 0.05,
        }
    }
}

/// Welch t-test of one partner's monthly values before and after the break
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakTestResult {
    pub partner: CountryId,
    pub break_period: Period,
    pub before_n: usize,
    pub after_n: usize,
    pub before_mean: f64,
    pub after_mean: f64,
    /// Positive when the level dropped after the break
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    /// Shift in units of the pooled std-dev; undefined when that is zero
    pub cohens_d: Option<f64>,
    pub significant: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BreakReport {
    pub results: Vec<BreakTestResult>,
    pub undefined: Vec<(CountryId, StatisticalUndefined)>,
}

/// Structural-break test over monthly partner series
pub struct BreakDetector {
    config: BreakConfig,
}

impl BreakDetector {
    pub fn new(config: BreakConfig) -> Self {
        Self { config }
    }

    pub fn run(&self, series: &BTreeMap<CountryId, BTreeMap<Period, f64>>) -> BreakReport {
        let mut report = BreakReport::default();
        for (partner, values) in series {
            match self.test(partner, values) {
                Ok(result) => report.results.push(result),
                Err(reason) => report.undefined.push((partner.clone(), reason)),
            }
        }
        report
            .results
            .sort_by(|a, b| a.p_value.total_cmp(&b.p_value).then_with(|| a.partner.cmp(&b.partner)));
        report
    }

    pub fn test(
        &self,
        partner: &CountryId,
        series: &BTreeMap<Period, f64>,
    ) -> Result<BreakTestResult, StatisticalUndefined> {
        let (before, after): (Vec<(&Period, &f64)>, Vec<(&Period, &f64)>) = series
            .iter()
            .filter(|(p, _)| p.is_monthly())
            .partition(|(p, _)| **p < self.config.break_period);
        let before: Vec<f64> = before.into_iter().map(|(_, v)| *v).collect();
        let after: Vec<f64> = after.into_iter().map(|(_, v)| *v).collect();

        if before.len() < 2 || after.len() < 2 {
            return Err(StatisticalUndefined::InsufficientBreakSamples {
                before: before.len(),
                after: after.len(),
            });
        }

        let (n1, n2) = (before.len() as f64, after.len() as f64);
        let (m1, m2) = (before.iter().mean(), after.iter().mean());
        let (v1, v2) = (before.iter().variance(), after.iter().variance());

        let se_sq = v1 / n1 + v2 / n2;
        if se_sq <= 0.0 {
            return Err(StatisticalUndefined::ZeroVariance);
        }
        let t = (m1 - m2) / se_sq.sqrt();

        // Welch–Satterthwaite
        let df = se_sq.powi(2) / ((v1 / n1).powi(2) / (n1 - 1.0) + (v2 / n2).powi(2) / (n2 - 1.0));

        let dist = StudentsT::new(0.0, 1.0, df).map_err(|_| StatisticalUndefined::ZeroVariance)?;
        let p_value = (2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0);

        let pooled = ((v1 + v2) / 2.0).sqrt();
        let cohens_d = (pooled > 0.0).then(|| (m2 - m1) / pooled);

        Ok(BreakTestResult {
            partner: partner.clone(),
            break_period: self.config.break_period,
            before_n: before.len(),
            after_n: after.len(),
            before_mean: m1,
            after_mean: m2,
            t_statistic: t,
            degrees_of_freedom: df,
            p_value,
            cohens_d,
            significant: p_value < self.config.alpha,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monthly(points: &[(i32, u32, f64)]) -> BTreeMap<Period, f64> {
        points
            .iter()
            .map(|(year, month, v)| (Period::Month { year: *year, month: *month }, *v))
            .collect()
    }

    #[test]
    fn test_clear_level_shift() {
        let series = monthly(&[
            (2021, 12, 10.0),
            (2022, 1, 11.0),
            (2022, 2, 9.0),
            (2022, 3, 30.0),
            (2022, 4, 31.0),
            (2022, 5, 29.0),
        ]);
        let result = BreakDetector::new(BreakConfig::default())
            .test(&"Kyrgyzstan".into(), &series)
            .unwrap();

        assert_eq!(result.before_n, 3);
        assert_eq!(result.after_n, 3);
        assert!((result.before_mean - 10.0).abs() < 1e-12);
        assert!((result.after_mean - 30.0).abs() < 1e-12);
        // equal variances of 1: t = -20 / sqrt(2/3), df = 4
        assert!((result.t_statistic + 20.0 / (2.0f64 / 3.0).sqrt()).abs() < 1e-9);
        assert!((result.degrees_of_freedom - 4.0).abs() < 1e-9);
        assert!(result.p_value < 0.001);
        assert!(result.significant);
        assert!((result.cohens_d.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_shift_is_not_significant() {
        let series = monthly(&[(2022, 1, 10.0), (2022, 2, 12.0), (2022, 3, 12.0), (2022, 4, 10.0)]);
        let result = BreakDetector::new(BreakConfig::default())
            .test(&"X".into(), &series)
            .unwrap();
        assert!(result.t_statistic.abs() < 1e-12);
        assert!((result.p_value - 1.0).abs() < 1e-9);
        assert!(!result.significant);
    }

    #[test]
    fn test_insufficient_and_flat_series() {
        let detector = BreakDetector::new(BreakConfig::default());

        let short = monthly(&[(2022, 1, 1.0), (2022, 4, 2.0), (2022, 5, 3.0)]);
        assert_eq!(
            detector.test(&"X".into(), &short).unwrap_err(),
            StatisticalUndefined::InsufficientBreakSamples { before: 1, after: 2 }
        );

        let flat = monthly(&[(2022, 1, 5.0), (2022, 2, 5.0), (2022, 3, 5.0), (2022, 4, 5.0)]);
        assert_eq!(
            detector.test(&"X".into(), &flat).unwrap_err(),
            StatisticalUndefined::ZeroVariance
        );
    }

    #[test]
    fn test_annual_points_ignored() {
        let mut series = monthly(&[(2022, 1, 1.0), (2022, 2, 2.0), (2022, 4, 2.0), (2022, 5, 3.0)]);
        series.insert(Period::Year(2021), 1000.0);

        let mut all = BTreeMap::new();
        all.insert(CountryId::from("X"), series);
        let report = BreakDetector::new(BreakConfig::default()).run(&all);
        assert_eq!(report.results.len(), 1);
        assert_eq!(report.results[0].before_n, 2);
    }
}
