//! Error taxonomy for the sampling engine
//!
//! - [`ConfigError`]: rejected at setup, the collector is never built
//! - [`SourceError`]: a counter source could not be read or parsed
//! - [`CollectorError`]: construction failure (bad config or first sample)

use std::path::PathBuf;
use thiserror::Error;

/// Configuration problems detected before a collector comes online
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("metric name must not be empty")]
    EmptyName,

    #[error("metric '{metric}': refresh interval must be non-zero")]
    ZeroInterval { metric: String },

    #[error("unknown unit '{0}' (expected one of B, KB, MB, GB)")]
    UnknownUnit(String),

    #[error("unknown field '{field}' for {kind} metric")]
    UnknownField { kind: &'static str, field: String },

    #[error("field '{0}' is not present in the counter snapshot")]
    MissingField(String),

    #[error("unknown disk direction '{0}' (expected read, write or average)")]
    UnknownDirection(String),

    #[error("load average window must be 1, 5 or 15 minutes, got {0}")]
    UnknownLoadWindow(u8),

    #[error("state list must contain at least one range")]
    EmptyStates,

    #[error("state range #{index} is invalid: from={from} to={to}")]
    InvalidRange { index: usize, from: f64, to: f64 },

    #[error("state range #{index} is not sorted: from={from} is below previous from={previous}")]
    UnsortedRanges { index: usize, previous: f64, from: f64 },

    #[error("state range #{index} leaves a gap: expected from={expected}, found {found}")]
    NonContiguousRanges { index: usize, expected: f64, found: f64 },

    #[error("state ranges cover [{from}, {to}) but the metric domain is [{min}, {max}]")]
    DomainNotCovered { from: f64, to: f64, min: f64, max: f64 },

    #[error("state ranges span [{from}, {to}] beyond the metric domain [{min}, {max}]")]
    OutsideDomain { from: f64, to: f64, min: f64, max: f64 },
}

/// Failures reading or decoding a counter source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unexpected format in {}: {reason}", path.display())]
    Malformed { path: PathBuf, reason: String },

    #[error("counter '{0}' missing from sample")]
    MissingCounter(String),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Reasons a metric collector could not be brought online
#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("initial sample failed: {0}")]
    Source(#[from] SourceError),
}
