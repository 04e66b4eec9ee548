//! Rate normalization
//!
//! Two strategies turn a [`Delta`] into a meaningful value:
//! - fraction mode: CPU tick categories as shares of the interval
//! - throughput mode: transferred blocks per second

use crate::delta::Delta;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// CPU time accounting categories reported by the kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CpuField {
    User,
    Nice,
    System,
    Idle,
    Iowait,
    Irq,
    Softirq,
    Steal,
    Guest,
    GuestNice,
}

impl CpuField {
    /// All categories in `/proc/stat` column order
    pub const ALL: [CpuField; 10] = [
        CpuField::User,
        CpuField::Nice,
        CpuField::System,
        CpuField::Idle,
        CpuField::Iowait,
        CpuField::Irq,
        CpuField::Softirq,
        CpuField::Steal,
        CpuField::Guest,
        CpuField::GuestNice,
    ];

    /// Counter name used in snapshots
    pub fn name(&self) -> &'static str {
        match self {
            CpuField::User => "user",
            CpuField::Nice => "nice",
            CpuField::System => "system",
            CpuField::Idle => "idle",
            CpuField::Iowait => "iowait",
            CpuField::Irq => "irq",
            CpuField::Softirq => "softirq",
            CpuField::Steal => "steal",
            CpuField::Guest => "guest",
            CpuField::GuestNice => "guest_nice",
        }
    }

    fn position(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(0)
    }
}

impl FromStr for CpuField {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CpuField::ALL
            .iter()
            .copied()
            .find(|f| f.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownField {
                kind: "cpu",
                field: s.to_string(),
            })
    }
}

/// What a CPU metric reports: one category or overall activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuSelector {
    Field(CpuField),
    /// Everything but idle
    Active,
}

impl CpuSelector {
    /// Parse a configured selector; `None` selects overall activity
    pub fn parse(name: Option<&str>) -> Result<Self, ConfigError> {
        match name.map(str::trim) {
            None | Some("") => Ok(CpuSelector::Active),
            Some(s)
                if ["active", "total", "total-use"]
                    .iter()
                    .any(|alias| alias.eq_ignore_ascii_case(s)) =>
            {
                Ok(CpuSelector::Active)
            }
            Some(s) => s.parse().map(CpuSelector::Field),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CpuSelector::Field(field) => field.name(),
            CpuSelector::Active => "active",
        }
    }
}

/// Share of each CPU category in one interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuFractions {
    values: [f64; 10],
    total_ticks: u64,
}

impl CpuFractions {
    pub fn get(&self, field: CpuField) -> f64 {
        self.values[field.position()]
    }

    /// Fraction of the interval not spent idle
    pub fn active(&self) -> f64 {
        if self.total_ticks == 0 {
            return 0.0;
        }
        (1.0 - self.get(CpuField::Idle)).clamp(0.0, 1.0)
    }

    pub fn select(&self, selector: CpuSelector) -> f64 {
        match selector {
            CpuSelector::Field(field) => self.get(field),
            CpuSelector::Active => self.active(),
        }
    }

    /// Sum of all category fractions (1.0 unless the interval had no ticks)
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }
}

/// Split CPU tick deltas into fractions of the interval total
pub fn fractions(delta: &Delta) -> Result<CpuFractions, ConfigError> {
    let mut ticks = [0u64; 10];
    for (slot, field) in ticks.iter_mut().zip(CpuField::ALL) {
        *slot = delta.get(field.name())?;
    }

    let total_ticks = ticks.iter().fold(0u64, |acc, t| acc.saturating_add(*t));
    let mut values = [0.0; 10];
    if total_ticks > 0 {
        let total = total_ticks as f64;
        for (value, t) in values.iter_mut().zip(ticks) {
            *value = t as f64 / total;
        }
    }

    Ok(CpuFractions {
        values,
        total_ticks,
    })
}

/// Bytes per second moved during an interval
pub fn speed(delta_blocks: u64, block_size: u64, elapsed_ms: u64) -> f64 {
    let bytes = delta_blocks.saturating_mul(block_size);
    if bytes > 0 && elapsed_ms > 0 {
        bytes as f64 / (elapsed_ms as f64 / 1000.0)
    } else {
        0.0
    }
}

/// Percentage of `total` not covered by `available`
pub fn percent_used(total: u64, available: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let used = total.saturating_sub(available);
    (used as f64 * 100.0 / total as f64).clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::{delta, DeltaOutcome};
    use crate::models::{CounterSnapshot, Unit};

    fn cpu_delta(ticks: [u64; 10]) -> Delta {
        let zero = CounterSnapshot::from_counters(0, CpuField::ALL.map(|f| (f.name(), 0)));
        let now = CounterSnapshot::from_counters(
            1000,
            CpuField::ALL.iter().zip(ticks).map(|(f, t)| (f.name(), t)),
        );
        match delta(&zero, &now) {
            DeltaOutcome::Updated(d) => d,
            DeltaOutcome::NoUpdate => panic!("expected an update"),
        }
    }

    #[test]
    fn test_cpu_fractions() {
        let f = fractions(&cpu_delta([50, 0, 30, 920, 0, 0, 0, 0, 0, 0])).unwrap();

        assert_eq!(f.total_ticks(), 1000);
        assert!((f.get(CpuField::User) - 0.05).abs() < 1e-9);
        assert!((f.get(CpuField::System) - 0.03).abs() < 1e-9);
        assert!((f.get(CpuField::Idle) - 0.92).abs() < 1e-9);
        assert!((f.sum() - 1.0).abs() < 1e-6);
        assert!((f.active() - 0.08).abs() < 1e-9);
    }

    #[test]
    fn test_cpu_fractions_zero_total_is_zero_not_nan() {
        let f = fractions(&cpu_delta([0; 10])).unwrap();

        for field in CpuField::ALL {
            assert_eq!(f.get(field), 0.0);
        }
        assert_eq!(f.active(), 0.0);
        assert_eq!(f.sum(), 0.0);
    }

    #[test]
    fn test_cpu_fractions_require_all_categories() {
        let prev = CounterSnapshot::from_counters(0, [("user", 0), ("idle", 0)]);
        let now = CounterSnapshot::from_counters(10, [("user", 5), ("idle", 5)]);
        let DeltaOutcome::Updated(d) = delta(&prev, &now) else {
            panic!("expected an update");
        };

        assert_eq!(
            fractions(&d),
            Err(ConfigError::MissingField("nice".to_string()))
        );
    }

    #[test]
    fn test_cpu_selector_parse() {
        assert_eq!(CpuSelector::parse(None).unwrap(), CpuSelector::Active);
        assert_eq!(CpuSelector::parse(Some("total")).unwrap(), CpuSelector::Active);
        assert_eq!(
            CpuSelector::parse(Some("total-use")).unwrap(),
            CpuSelector::Active
        );
        assert_eq!(
            CpuSelector::parse(Some("IOWAIT")).unwrap(),
            CpuSelector::Field(CpuField::Iowait)
        );
        assert_eq!(
            CpuSelector::parse(Some("guest_nice")).unwrap(),
            CpuSelector::Field(CpuField::GuestNice)
        );
        assert!(matches!(
            CpuSelector::parse(Some("bogus")),
            Err(ConfigError::UnknownField { kind: "cpu", .. })
        ));
    }

    #[test]
    fn test_speed() {
        let bps = speed(2000, 512, 1000);
        assert_eq!(bps, 1_024_000.0);

        let mb = Unit::lookup("MB").unwrap().scale_speed(bps);
        assert!((mb - 0.9766).abs() < 1e-4);
    }

    #[test]
    fn test_speed_degenerate_inputs() {
        assert_eq!(speed(0, 512, 1000), 0.0);
        assert_eq!(speed(2000, 512, 0), 0.0);
        assert_eq!(speed(2000, 0, 1000), 0.0);
        assert!(speed(u64::MAX, u64::MAX, 1).is_finite());
    }

    #[test]
    fn test_percent_used() {
        assert_eq!(percent_used(1000, 250), 75.0);
        assert_eq!(percent_used(0, 0), 0.0);
        assert_eq!(percent_used(100, 200), 0.0);
    }
}
