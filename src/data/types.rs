use crate::data::Period;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a trade flow from the reporter's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Flow {
    Export,
    Import,
}

impl Flow {
    /// Parse a flow label as written by the sources.
    ///
    /// Comext encodes flows numerically (1 = import, 2 = export).
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "export" | "exports" | "x" | "2" => Some(Flow::Export),
            "import" | "imports" | "m" | "1" => Some(Flow::Import),
            _ => None,
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flow::Export => write!(f, "EXPORT"),
            Flow::Import => write!(f, "IMPORT"),
        }
    }
}

/// Currency a source reports its values in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Eur,
    Usd,
}

/// Unit scaling applied by a source (national tables report thousands)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scale {
    Units,
    Thousands,
}

impl Scale {
    pub fn factor(&self) -> f64 {
        match self {
            Scale::Units => 1.0,
            Scale::Thousands => 1_000.0,
        }
    }
}

/// Import valuation basis.
///
/// Consignment attributes goods to the dispatching country, origin to the
/// country of production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValuationBasis {
    Consignment,
    Origin,
}

impl fmt::Display for ValuationBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValuationBasis::Consignment => write!(f, "consignment"),
            ValuationBasis::Origin => write!(f, "origin"),
        }
    }
}

/// Statistical source a record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceId {
    Eurostat,
    Kyrgyzstan,
    Kazakhstan,
    Armenia,
    Uzbekistan,
}

impl SourceId {
    pub fn all() -> &'static [SourceId] {
        &[
            SourceId::Eurostat,
            SourceId::Kyrgyzstan,
            SourceId::Kazakhstan,
            SourceId::Armenia,
            SourceId::Uzbekistan,
        ]
    }

    /// National statistics office, as opposed to the EU-side mirror source
    pub fn is_national(&self) -> bool {
        !matches!(self, SourceId::Eurostat)
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceId::Eurostat => "eurostat",
            SourceId::Kyrgyzstan => "kyrgyzstan",
            SourceId::Kazakhstan => "kazakhstan",
            SourceId::Armenia => "armenia",
            SourceId::Uzbekistan => "uzbekistan",
        };
        write!(f, "{}", name)
    }
}

/// Canonical country identity: the reconciled name shared by every spelling
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountryId(String);

impl CountryId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CountryId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Row as read from a source file, before any normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub reporter: String,
    pub partner: String,
    pub period: String,
    pub value: f64,
    pub currency: Currency,
    pub scale: Scale,
    pub flow: Flow,
    pub valuation: Option<ValuationBasis>,
    /// 1-based line in the source file
    pub line: usize,
}

/// Canonical trade record. Immutable once built by the canonicalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub reporter: CountryId,
    pub partner: CountryId,
    pub flow: Flow,
    pub period: Period,
    pub value_eur: f64,
    pub source: SourceId,
    pub valuation: Option<ValuationBasis>,
}
