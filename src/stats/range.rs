//! Stretch ranges and caller overrides.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default `low` for an override entry that omits it.
pub const DEFAULT_OVERRIDE_LOW: f64 = 0.0;

/// Default `high` for an override entry that omits it.
pub const DEFAULT_OVERRIDE_HIGH: f64 = 1000.0;

fn default_low() -> f64 {
    DEFAULT_OVERRIDE_LOW
}

fn default_high() -> f64 {
    DEFAULT_OVERRIDE_HIGH
}

/// Raw values mapped to output 0 (`low`) and 255 (`high`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchRange {
    #[serde(default = "default_low")]
    pub low: f64,
    #[serde(default = "default_high")]
    pub high: f64,
}

impl StretchRange {
    /// Range used for binary masks and bands without any valid pixel.
    pub const UNIT: StretchRange = StretchRange {
        low: 0.0,
        high: 1.0,
    };

    /// Range used for normalized-index data.
    pub const SIGNED_UNIT: StretchRange = StretchRange {
        low: -1.0,
        high: 1.0,
    };

    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    /// Whether the range maps anything above 0. A range with
    /// `high <= low` (or NaN bounds) renders its band as all zeros.
    pub fn is_degenerate(&self) -> bool {
        !(self.high > self.low)
    }
}

impl fmt::Display for StretchRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.low, self.high)
    }
}

impl FromStr for StretchRange {
    type Err = String;

    /// Parse `"low:high"`; either side may be empty to take its default.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (low, high) = s
            .split_once(':')
            .ok_or_else(|| format!("expected low:high, got '{s}'"))?;
        let parse = |part: &str, default: f64| -> Result<f64, String> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(default);
            }
            part.parse::<f64>()
                .map_err(|e| format!("invalid bound '{part}': {e}"))
        };
        Ok(Self {
            low: parse(low, DEFAULT_OVERRIDE_LOW)?,
            high: parse(high, DEFAULT_OVERRIDE_HIGH)?,
        })
    }
}

/// Caller-supplied stretch ranges keyed by 1-based band index.
///
/// Deserializes from JSON such as `{"1": {"low": 10, "high": 200}}`;
/// missing bounds fall back to `0` and `1000`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsOverride(BTreeMap<usize, StretchRange>);

impl StatsOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, band: usize, range: StretchRange) -> Self {
        self.0.insert(band, range);
        self
    }

    pub fn insert(&mut self, band: usize, range: StretchRange) {
        self.0.insert(band, range);
    }

    pub fn get(&self, band: usize) -> Option<StretchRange> {
        self.0.get(&band).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Canonical text form: `|band=low:high` per entry in band order.
    pub fn fingerprint(&self) -> String {
        self.0
            .iter()
            .map(|(band, range)| format!("|{band}={range}"))
            .collect()
    }
}

impl FromIterator<(usize, StretchRange)> for StatsOverride {
    fn from_iter<I: IntoIterator<Item = (usize, StretchRange)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
