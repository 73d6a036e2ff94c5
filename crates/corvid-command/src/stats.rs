//! Statistics gathered from commands and external providers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Severity of a statistic; lower levels are more detailed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum StatLevel {
    Finest,
    Finer,
    Fine,
    Config,
    #[default]
    Info,
    Warning,
    Severe,
}

impl StatLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            StatLevel::Finest => "finest",
            StatLevel::Finer => "finer",
            StatLevel::Fine => "fine",
            StatLevel::Config => "config",
            StatLevel::Info => "info",
            StatLevel::Warning => "warning",
            StatLevel::Severe => "severe",
        }
    }
}

impl fmt::Display for StatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "finest" | "all" => Ok(StatLevel::Finest),
            "finer" => Ok(StatLevel::Finer),
            "fine" => Ok(StatLevel::Fine),
            "config" => Ok(StatLevel::Config),
            "info" => Ok(StatLevel::Info),
            "warning" => Ok(StatLevel::Warning),
            "severe" => Ok(StatLevel::Severe),
            other => Err(format!("unknown statistics level: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for StatValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatValue::Int(v) => write!(f, "{v}"),
            StatValue::Float(v) => write!(f, "{v:.2}"),
            StatValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Int(v)
    }
}

impl From<usize> for StatValue {
    fn from(v: usize) -> Self {
        StatValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<u64> for StatValue {
    fn from(v: u64) -> Self {
        StatValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Float(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

impl From<String> for StatValue {
    fn from(v: String) -> Self {
        StatValue::Text(v)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatRecord {
    pub component: String,
    pub name: String,
    pub value: StatValue,
    pub level: StatLevel,
}

/// Records at or above a threshold level.
#[derive(Debug, Clone, Default)]
pub struct StatisticsList {
    threshold: StatLevel,
    records: Vec<StatRecord>,
}

impl StatisticsList {
    pub fn new(threshold: StatLevel) -> Self {
        Self {
            threshold,
            records: Vec::new(),
        }
    }

    pub fn threshold(&self) -> StatLevel {
        self.threshold
    }

    /// Whether a record at `level` would be kept.
    pub fn check_level(&self, level: StatLevel) -> bool {
        level >= self.threshold
    }

    /// Add a record; returns false if it was filtered out.
    pub fn add(
        &mut self,
        component: &str,
        name: &str,
        value: impl Into<StatValue>,
        level: StatLevel,
    ) -> bool {
        if !self.check_level(level) {
            return false;
        }
        self.records.push(StatRecord {
            component: component.to_string(),
            name: name.to_string(),
            value: value.into(),
            level,
        });
        true
    }

    pub fn get(&self, component: &str, name: &str) -> Option<&StatValue> {
        self.records
            .iter()
            .find(|r| r.component == component && r.name == name)
            .map(|r| &r.value)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StatRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<StatRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a StatisticsList {
    type Item = &'a StatRecord;
    type IntoIter = std::slice::Iter<'a, StatRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// External contributor of statistics and periodic work.
pub trait StatisticsProvider: Send + Sync {
    /// Whether this provider reports for the named component.
    fn belongs_to(&self, component: &str) -> bool;

    fn statistics(&self, component: &str, list: &mut StatisticsList);

    fn every_second(&self) {}

    fn every_minute(&self) {}

    fn every_hour(&self) {}
}
