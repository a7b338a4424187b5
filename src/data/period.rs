use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Reporting period, normalized to either a calendar year or a year-month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    Year(i32),
    Month { year: i32, month: u32 },
}

#[derive(Error, Debug, Clone, PartialEq)]
#[error("unrecognized period label '{0}'")]
pub struct PeriodError(pub String);

impl Period {
    /// Parse any of the period shapes the sources emit:
    /// `Aug. 2024`, `August 2024`, `202408-Aug. 2024`, `Y2022`, `2022`,
    /// `2022-08`, `202408`, `2022M08`.
    pub fn parse(label: &str) -> Result<Self, PeriodError> {
        let err = || PeriodError(label.to_string());
        let s = label.trim().trim_start_matches('\u{feff}');
        if s.is_empty() {
            return Err(err());
        }

        // Y2022
        if let Some(rest) = s.strip_prefix(&['Y', 'y'][..]) {
            if is_digits(rest, 4) {
                return year(rest).ok_or_else(err);
            }
        }

        // 2022 / 202408
        if s.chars().all(|c| c.is_ascii_digit()) {
            return match s.len() {
                4 => year(s).ok_or_else(err),
                6 => year_month(&s[..4], &s[4..]).ok_or_else(err),
                _ => Err(err()),
            };
        }

        // 2022M08
        if let Some((y, m)) = s.split_once(&['M', 'm'][..]) {
            if is_digits(y, 4) && !m.is_empty() && m.len() <= 2 && m.chars().all(|c| c.is_ascii_digit()) {
                return year_month(y, m).ok_or_else(err);
            }
        }

        // 2022-08 / 202408-Aug. 2024
        if let Some((left, right)) = s.split_once('-') {
            let left = left.trim();
            if is_digits(left, 4) && !right.is_empty() && right.len() <= 2 {
                return year_month(left, right).ok_or_else(err);
            }
            if is_digits(left, 6) {
                return year_month(&left[..4], &left[4..]).ok_or_else(err);
            }
        }

        // Aug. 2024 / August 2024
        let mut tokens = s.split_whitespace();
        if let (Some(name), Some(y), None) = (tokens.next(), tokens.next(), tokens.next()) {
            if is_digits(y, 4) {
                return month_name(name, y).ok_or_else(err);
            }
        }

        Err(err())
    }

    pub fn year(&self) -> i32 {
        match self {
            Period::Year(y) => *y,
            Period::Month { year, .. } => *year,
        }
    }

    pub fn month(&self) -> Option<u32> {
        match self {
            Period::Year(_) => None,
            Period::Month { month, .. } => Some(*month),
        }
    }

    pub fn is_monthly(&self) -> bool {
        matches!(self, Period::Month { .. })
    }

    /// Calendar year this period rolls up into
    pub fn to_year(&self) -> Period {
        Period::Year(self.year())
    }

    fn sort_key(&self) -> (i32, u32) {
        (self.year(), self.month().unwrap_or(0))
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.chars().all(|c| c.is_ascii_digit())
}

fn year(s: &str) -> Option<Period> {
    s.parse().ok().map(Period::Year)
}

fn year_month(y: &str, m: &str) -> Option<Period> {
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.trim().parse().ok()?;
    (1..=12).contains(&month).then_some(Period::Month { year, month })
}

fn month_name(name: &str, y: &str) -> Option<Period> {
    // chrono's %b accepts three-letter abbreviations and full names, but not
    // "Sept.", so only the first three letters are handed over.
    let name = name.trim_end_matches('.');
    let abbrev = name.get(..3)?;
    let date = NaiveDate::parse_from_str(&format!("1 {} {}", abbrev, y), "%d %b %Y").ok()?;
    Some(Period::Month {
        year: date.year(),
        month: date.month(),
    })
}

impl Ord for Period {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for Period {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Period::Year(y) => write!(f, "{:04}", y),
            Period::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

impl FromStr for Period {
    type Err = PeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::parse(s)
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Period::parse(&label).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(year: i32, month: u32) -> Period {
        Period::Month { year, month }
    }

    #[test]
    fn test_eurostat_month_labels() {
        assert_eq!(Period::parse("Aug. 2024").unwrap(), month(2024, 8));
        assert_eq!(Period::parse("Sept. 2023").unwrap(), month(2023, 9));
        assert_eq!(Period::parse("August 2024").unwrap(), month(2024, 8));
        assert_eq!(Period::parse("202408-Aug. 2024").unwrap(), month(2024, 8));
    }

    #[test]
    fn test_year_labels() {
        assert_eq!(Period::parse("Y2022").unwrap(), Period::Year(2022));
        assert_eq!(Period::parse("2022").unwrap(), Period::Year(2022));
        assert_eq!(Period::parse(" 2019 ").unwrap(), Period::Year(2019));
    }

    #[test]
    fn test_numeric_month_labels() {
        assert_eq!(Period::parse("2022-08").unwrap(), month(2022, 8));
        assert_eq!(Period::parse("202203").unwrap(), month(2022, 3));
        assert_eq!(Period::parse("2022M08").unwrap(), month(2022, 8));
    }

    #[test]
    fn test_all_shapes_share_one_representation() {
        let labels = ["Aug. 2024", "202408-Aug. 2024", "2024-08", "202408"];
        let rendered: Vec<String> = labels
            .iter()
            .map(|l| Period::parse(l).unwrap().to_string())
            .collect();
        assert!(rendered.iter().all(|r| r == "2024-08"));
        assert_eq!(Period::parse("Y2022").unwrap().to_string(), "2022");
    }

    #[test]
    fn test_invalid_labels() {
        assert!(Period::parse("").is_err());
        assert!(Period::parse("2022-13").is_err());
        assert!(Period::parse("Foo. 2022").is_err());
        assert!(Period::parse("22").is_err());
        assert!(Period::parse("Q3 2022").is_err());
    }

    #[test]
    fn test_chronological_ordering() {
        let mut periods = vec![month(2022, 2), Period::Year(2022), month(2021, 12), Period::Year(2021)];
        periods.sort();
        assert_eq!(
            periods,
            vec![Period::Year(2021), month(2021, 12), Period::Year(2022), month(2022, 2)]
        );
    }

    #[test]
    fn test_serde_roundtrip_as_label() {
        let json = serde_json::to_string(&month(2024, 8)).unwrap();
        assert_eq!(json, "\"2024-08\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, month(2024, 8));
    }
}
