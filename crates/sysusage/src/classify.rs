//! Threshold classification
//!
//! Maps a scalar metric onto an ordered list of [`StateRange`]s. Ranges are
//! half-open `[from, to)`: a value sitting exactly on a boundary belongs to
//! the next range. The last range is closed so the top of the domain (100%,
//! a fraction of 1.0) still classifies.

use crate::error::ConfigError;
use crate::models::{ClassifiedState, StateRange};
use std::sync::Arc;
use tracing::warn;

/// Legal value range of a metric
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub min: f64,
    /// `None` for metrics without an upper bound (throughput, uptime)
    pub max: Option<f64>,
}

impl Domain {
    pub const FRACTION: Domain = Domain {
        min: 0.0,
        max: Some(1.0),
    };
    pub const PERCENT: Domain = Domain {
        min: 0.0,
        max: Some(100.0),
    };
    pub const UNBOUNDED: Domain = Domain {
        min: 0.0,
        max: None,
    };
}

/// Index of the first range containing `value`, in configured order
pub fn classify(value: f64, ranges: &[StateRange]) -> Option<usize> {
    let last = ranges.len().checked_sub(1)?;
    ranges.iter().enumerate().position(|(ix, range)| {
        value >= range.from && (value < range.to || (ix == last && value == range.to))
    })
}

/// Whether moving from `previous` to `next` is a state change.
///
/// Identity is the range position: two entries with the same label are
/// still different states.
pub fn transition(previous: Option<usize>, next: Option<usize>) -> bool {
    previous != next
}

/// Validated, immutable range list for one metric
#[derive(Debug, Clone)]
pub struct StateClassifier {
    ranges: Arc<[StateRange]>,
}

impl StateClassifier {
    /// Validate `ranges` against `domain`.
    ///
    /// Rejects empty lists, inverted ranges, unsorted or gapped lists and
    /// lists that do not exactly span the domain. Overlaps are accepted with
    /// a warning; the earlier range wins.
    pub fn new(ranges: Vec<StateRange>, domain: Domain) -> Result<Self, ConfigError> {
        let first = ranges.first().ok_or(ConfigError::EmptyStates)?;
        let last = ranges.last().ok_or(ConfigError::EmptyStates)?;

        for (index, range) in ranges.iter().enumerate() {
            if range.from.is_nan() || range.to.is_nan() || range.to <= range.from {
                return Err(ConfigError::InvalidRange {
                    index,
                    from: range.from,
                    to: range.to,
                });
            }
        }

        for (index, pair) in ranges.windows(2).enumerate() {
            let (prev, next) = (&pair[0], &pair[1]);
            let index = index + 1;
            if next.from < prev.from {
                return Err(ConfigError::UnsortedRanges {
                    index,
                    previous: prev.from,
                    from: next.from,
                });
            }
            if next.from > prev.to {
                return Err(ConfigError::NonContiguousRanges {
                    index,
                    expected: prev.to,
                    found: next.from,
                });
            }
            if next.from < prev.to {
                warn!(
                    index,
                    label = %next.label,
                    overlaps = %prev.label,
                    "State ranges overlap, the earlier range takes precedence"
                );
            }
        }

        let covered_max = domain.max.map_or(true, |max| last.to >= max);
        if first.from > domain.min || !covered_max {
            return Err(ConfigError::DomainNotCovered {
                from: first.from,
                to: last.to,
                min: domain.min,
                max: domain.max.unwrap_or(f64::INFINITY),
            });
        }

        // A bounded domain caps the ranges too
        let exceeds_max = domain.max.is_some_and(|max| last.to > max);
        if first.from < domain.min || exceeds_max {
            return Err(ConfigError::OutsideDomain {
                from: first.from,
                to: last.to,
                min: domain.min,
                max: domain.max.unwrap_or(f64::INFINITY),
            });
        }

        Ok(Self {
            ranges: ranges.into(),
        })
    }

    pub fn ranges(&self) -> &[StateRange] {
        &self.ranges
    }

    pub fn classify(&self, value: f64) -> Option<usize> {
        classify(value, &self.ranges)
    }

    /// Classify `value` and compare with the `previous` classification
    pub fn evaluate(&self, value: f64, previous: Option<usize>) -> ClassifiedState {
        let index = self.classify(value);
        ClassifiedState {
            index,
            range: index.and_then(|ix| self.ranges.get(ix).cloned()),
            changed: transition(previous, index),
        }
    }
}
