//! Core data models for the sampling engine

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Timestamped set of cumulative counters taken at one poll
///
/// Snapshots are built once by a counter source and never modified
/// afterwards; collectors replace them wholesale on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    counters: BTreeMap<String, u64>,
    timestamp_ms: u64,
}

impl CounterSnapshot {
    /// Build a snapshot from `(name, value)` pairs sampled at `timestamp_ms`
    pub fn from_counters<I, K>(timestamp_ms: u64, counters: I) -> Self
    where
        I: IntoIterator<Item = (K, u64)>,
        K: Into<String>,
    {
        Self {
            counters: counters.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            timestamp_ms,
        }
    }

    /// Monotonic sample time in milliseconds
    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.counters.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counters.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

/// Display unit for throughput values
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Unit {
    /// Bytes per unit
    pub scale: f64,
    pub id: &'static str,
    pub speed_label: &'static str,
}

/// Supported units, in lookup order
pub const UNITS: [Unit; 4] = [
    Unit {
        scale: 1.0,
        id: "B",
        speed_label: "B/s",
    },
    Unit {
        scale: 1024.0,
        id: "KB",
        speed_label: "KB/s",
    },
    Unit {
        scale: 1_048_576.0,
        id: "MB",
        speed_label: "MB/s",
    },
    Unit {
        scale: 1_073_741_824.0,
        id: "GB",
        speed_label: "GB/s",
    },
];

impl Unit {
    /// Resolve a configured unit identifier.
    ///
    /// Only the first letter is significant ("M", "MB", "mbytes" all select
    /// MB); the first table entry with the same initial wins.
    pub fn lookup(id: &str) -> Result<&'static Unit, ConfigError> {
        let first = id
            .trim()
            .chars()
            .next()
            .ok_or_else(|| ConfigError::UnknownUnit(id.to_string()))?;

        UNITS
            .iter()
            .find(|unit| unit.id.starts_with(first.to_ascii_uppercase()))
            .ok_or_else(|| ConfigError::UnknownUnit(id.to_string()))
    }

    /// Convert a bytes/second value into this unit
    pub fn scale_speed(&self, bytes_per_sec: f64) -> f64 {
        bytes_per_sec / self.scale
    }
}

/// Unit used when a disk metric does not configure one
pub const DEFAULT_UNIT: &Unit = &UNITS[2];

/// Severity attached to a state range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Unimportant,
    Ready,
    Warning,
    Error,
    Critical,
}

impl Severity {
    /// Numeric level exported as a gauge (0 = unimportant .. 4 = critical)
    pub fn level(&self) -> i64 {
        match self {
            Severity::Unimportant => 0,
            Severity::Ready => 1,
            Severity::Warning => 2,
            Severity::Error => 3,
            Severity::Critical => 4,
        }
    }

    /// True for severities that should be surfaced as warnings in logs
    pub fn is_alerting(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Unimportant => write!(f, "unimportant"),
            Severity::Ready => write!(f, "ready"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// One configured threshold range `[from, to)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRange {
    pub from: f64,
    pub to: f64,
    pub label: String,
    pub severity: Severity,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub body: String,
}

impl StateRange {
    pub fn new(
        from: f64,
        to: f64,
        label: impl Into<String>,
        severity: Severity,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            from,
            to,
            label: label.into(),
            severity,
            summary: summary.into(),
            body: String::new(),
        }
    }
}

/// Result of classifying the latest value of a metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedState {
    /// Position of the matching range in the configured list
    pub index: Option<usize>,
    pub range: Option<StateRange>,
    /// Whether this classification differs from the previous one
    pub changed: bool,
}

impl ClassifiedState {
    /// State reported before the first classification or when no range matches
    pub fn undefined() -> Self {
        Self {
            index: None,
            range: None,
            changed: false,
        }
    }

    pub fn is_defined(&self) -> bool {
        self.index.is_some()
    }

    pub fn label(&self) -> &str {
        self.range
            .as_ref()
            .map(|r| r.label.as_str())
            .unwrap_or("undefined")
    }

    pub fn severity(&self) -> Severity {
        self.range
            .as_ref()
            .map(|r| r.severity)
            .unwrap_or(Severity::Unimportant)
    }
}

/// Last published value of a metric, shared with readers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricReading {
    pub metric: String,
    /// `None` until the first interval has been computed
    pub value: Option<f64>,
    pub display: String,
    pub state: ClassifiedState,
    /// Wall-clock time of the last computed value (unix seconds)
    pub updated_at: Option<i64>,
    /// Number of computed intervals
    pub samples: u64,
}

impl MetricReading {
    pub fn pending(metric: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            value: None,
            display: String::new(),
            state: ClassifiedState::undefined(),
            updated_at: None,
            samples: 0,
        }
    }
}
