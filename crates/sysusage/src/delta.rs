//! Per-interval differences between two counter snapshots
//!
//! Kernel counters only ever grow, except when a device is re-attached or a
//! counter wraps. Every decrease is clamped to zero so downstream rates are
//! never negative.

use crate::error::ConfigError;
use crate::models::CounterSnapshot;
use std::collections::BTreeMap;

/// Field-wise counter differences over one interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    values: BTreeMap<String, u64>,
    elapsed_ms: u64,
}

impl Delta {
    /// Difference for `field`; absent fields are a configuration error
    pub fn get(&self, field: &str) -> Result<u64, ConfigError> {
        self.values
            .get(field)
            .copied()
            .ok_or_else(|| ConfigError::MissingField(field.to_string()))
    }

    /// Milliseconds between the two snapshots (always > 0)
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Outcome of comparing two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// No time has passed between the snapshots; skip normalization
    NoUpdate,
    Updated(Delta),
}

/// Difference of a single counter, clamped to zero on reset
pub fn counter_delta(previous: u64, current: u64) -> u64 {
    current.checked_sub(previous).unwrap_or(0)
}

/// Compute the delta between `previous` and `current`.
///
/// Only fields present in both snapshots are included.
pub fn delta(previous: &CounterSnapshot, current: &CounterSnapshot) -> DeltaOutcome {
    let elapsed_ms = match current.timestamp_ms().checked_sub(previous.timestamp_ms()) {
        Some(ms) if ms > 0 => ms,
        _ => return DeltaOutcome::NoUpdate,
    };

    let values = current
        .iter()
        .filter_map(|(name, now)| {
            previous
                .get(name)
                .map(|before| (name.to_string(), counter_delta(before, now)))
        })
        .collect();

    DeltaOutcome::Updated(Delta { values, elapsed_ms })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(ts: u64, counters: &[(&str, u64)]) -> CounterSnapshot {
        CounterSnapshot::from_counters(ts, counters.iter().map(|(k, v)| (*k, *v)))
    }

    fn updated(outcome: DeltaOutcome) -> Delta {
        match outcome {
            DeltaOutcome::Updated(delta) => delta,
            DeltaOutcome::NoUpdate => panic!("expected an update"),
        }
    }

    #[test]
    fn test_delta_of_growing_counters() {
        let d = updated(delta(
            &snap(1000, &[("user", 100), ("idle", 500)]),
            &snap(2000, &[("user", 150), ("idle", 900)]),
        ));

        assert_eq!(d.get("user").unwrap(), 50);
        assert_eq!(d.get("idle").unwrap(), 400);
        assert_eq!(d.elapsed_ms(), 1000);
    }

    #[test]
    fn test_counter_reset_clamps_to_zero() {
        let d = updated(delta(
            &snap(1000, &[("read.blocks", 100)]),
            &snap(2000, &[("read.blocks", 40)]),
        ));

        assert_eq!(d.get("read.blocks").unwrap(), 0);
    }

    #[test]
    fn test_counter_wraparound_never_wraps() {
        assert_eq!(counter_delta(u64::MAX, 3), 0);
        assert_eq!(counter_delta(3, u64::MAX), u64::MAX - 3);
    }

    #[test]
    fn test_identical_timestamps_signal_no_update() {
        let outcome = delta(&snap(5000, &[("user", 1)]), &snap(5000, &[("user", 9)]));
        assert_eq!(outcome, DeltaOutcome::NoUpdate);
    }

    #[test]
    fn test_clock_going_backwards_signals_no_update() {
        let outcome = delta(&snap(5000, &[("user", 1)]), &snap(4000, &[("user", 9)]));
        assert_eq!(outcome, DeltaOutcome::NoUpdate);
    }

    #[test]
    fn test_unchanged_counters_yield_zero_delta_not_no_update() {
        let d = updated(delta(&snap(1000, &[("user", 7)]), &snap(1500, &[("user", 7)])));
        assert_eq!(d.get("user").unwrap(), 0);
    }

    #[test]
    fn test_fields_missing_from_either_side_are_skipped() {
        let d = updated(delta(
            &snap(0, &[("user", 1), ("nice", 2)]),
            &snap(10, &[("user", 5), ("steal", 3)]),
        ));

        assert_eq!(d.iter().count(), 1);
        assert_eq!(
            d.get("steal"),
            Err(ConfigError::MissingField("steal".to_string()))
        );
        assert!(d.get("nice").is_err());
    }
}
