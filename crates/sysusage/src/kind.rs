//! Metric kinds
//!
//! Each kind names the counters it needs, the domain its values live in,
//! how an interval is turned into a value and how that value is displayed.

use crate::classify::Domain;
use crate::delta::Delta;
use crate::error::ConfigError;
use crate::models::{CounterSnapshot, Severity, StateRange, Unit};
use crate::normalize::{fractions, percent_used, speed, CpuField, CpuSelector};
use std::str::FromStr;

/// Which transfer direction a disk metric reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskDirection {
    Read,
    Write,
    /// Mean of read and write speed
    Average,
}

impl FromStr for DiskDirection {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(DiskDirection::Read),
            "write" => Ok(DiskDirection::Write),
            "average" => Ok(DiskDirection::Average),
            _ => Err(ConfigError::UnknownDirection(s.to_string())),
        }
    }
}

/// Load average window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadWindow {
    One,
    Five,
    Fifteen,
}

impl LoadWindow {
    pub fn from_minutes(minutes: u8) -> Result<Self, ConfigError> {
        match minutes {
            1 => Ok(LoadWindow::One),
            5 => Ok(LoadWindow::Five),
            15 => Ok(LoadWindow::Fifteen),
            other => Err(ConfigError::UnknownLoadWindow(other)),
        }
    }

    /// Snapshot counter holding this window, in hundredths
    pub fn counter(&self) -> &'static str {
        match self {
            LoadWindow::One => "load1",
            LoadWindow::Five => "load5",
            LoadWindow::Fifteen => "load15",
        }
    }
}

/// What a collector measures and how it normalizes it
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    /// CPU tick shares, as a fraction in [0, 1]
    Cpu { selector: CpuSelector },
    /// Used memory percentage
    Memory,
    /// Used swap percentage
    Swap,
    /// Disk throughput in `unit` per second
    Disk {
        device: Option<String>,
        direction: DiskDirection,
        unit: &'static Unit,
    },
    /// Seconds since boot
    Uptime,
    /// Load average as a percentage of the available cores
    LoadAverage { window: LoadWindow },
}

const DISK_COUNTERS: [&str; 2] = ["read.blocks", "write.blocks"];

impl MetricKind {
    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::Cpu { .. } => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Swap => "swap",
            MetricKind::Disk { .. } => "disk",
            MetricKind::Uptime => "uptime",
            MetricKind::LoadAverage { .. } => "loadavg",
        }
    }

    /// Counters a snapshot must carry for this kind
    pub fn required_counters(&self) -> Vec<&'static str> {
        match self {
            MetricKind::Cpu { .. } => CpuField::ALL.iter().map(|f| f.name()).collect(),
            MetricKind::Memory => vec!["MemTotal", "MemAvailable"],
            MetricKind::Swap => vec!["SwapTotal", "SwapFree"],
            MetricKind::Disk { .. } => DISK_COUNTERS.to_vec(),
            MetricKind::Uptime => vec!["uptime"],
            MetricKind::LoadAverage { window } => vec![window.counter(), "cores"],
        }
    }

    pub fn domain(&self) -> Domain {
        match self {
            MetricKind::Cpu { .. } => Domain::FRACTION,
            MetricKind::Memory | MetricKind::Swap | MetricKind::LoadAverage { .. } => {
                Domain::PERCENT
            }
            MetricKind::Disk { .. } | MetricKind::Uptime => Domain::UNBOUNDED,
        }
    }

    /// Value for one interval.
    ///
    /// Rate kinds use `delta`; gauge kinds read `current` directly.
    pub fn compute(
        &self,
        delta: &Delta,
        current: &CounterSnapshot,
        block_size: u64,
    ) -> Result<f64, ConfigError> {
        let gauge = |name: &str| {
            current
                .get(name)
                .ok_or_else(|| ConfigError::MissingField(name.to_string()))
        };

        match self {
            MetricKind::Cpu { selector } => Ok(fractions(delta)?.select(*selector)),
            MetricKind::Memory => Ok(percent_used(gauge("MemTotal")?, gauge("MemAvailable")?)),
            MetricKind::Swap => Ok(percent_used(gauge("SwapTotal")?, gauge("SwapFree")?)),
            MetricKind::Disk {
                direction, unit, ..
            } => {
                let elapsed = delta.elapsed_ms();
                let read = speed(delta.get("read.blocks")?, block_size, elapsed);
                let write = speed(delta.get("write.blocks")?, block_size, elapsed);
                let bytes_per_sec = match direction {
                    DiskDirection::Read => read,
                    DiskDirection::Write => write,
                    DiskDirection::Average => (read + write) / 2.0,
                };
                Ok(unit.scale_speed(bytes_per_sec))
            }
            MetricKind::Uptime => Ok(gauge("uptime")? as f64),
            MetricKind::LoadAverage { window } => {
                let load = gauge(window.counter())? as f64 / 100.0;
                let cores = gauge("cores")?.max(1) as f64;
                Ok((load * 100.0 / cores).clamp(0.0, 100.0))
            }
        }
    }

    /// Human readable rendering of a value
    pub fn display(&self, value: f64) -> String {
        match self {
            MetricKind::Cpu { .. } => format!("{:.2}%", value * 100.0),
            MetricKind::Memory | MetricKind::Swap | MetricKind::LoadAverage { .. } => {
                format!("{:.2}%", value)
            }
            MetricKind::Disk { unit, .. } => format!("{:.2} {}", value, unit.speed_label),
            MetricKind::Uptime => format_uptime(value.max(0.0) as u64),
        }
    }

    /// Built-in thresholds used when a metric configures none
    pub fn default_states(&self) -> Vec<StateRange> {
        match self {
            MetricKind::Cpu { .. } => vec![
                StateRange::new(0.0, 0.5, "good", Severity::Ready, "CPU usage is lower than 50%"),
                StateRange::new(0.5, 0.8, "gt50", Severity::Warning, "CPU usage is higher than 50%"),
                StateRange::new(0.8, 0.95, "gt90", Severity::Error, "CPU usage is higher than 80%"),
                StateRange::new(0.95, 1.0, "full", Severity::Critical, "CPU usage is too high"),
            ],
            MetricKind::LoadAverage { .. } => vec![
                StateRange::new(0.0, 50.0, "good", Severity::Ready, "System load is lower than 50%"),
                StateRange::new(50.0, 80.0, "gt50", Severity::Warning, "System load is higher than 50%"),
                StateRange::new(80.0, 95.0, "gt90", Severity::Error, "System load is higher than 80%"),
                StateRange::new(95.0, 100.0, "full", Severity::Critical, "System load is too high"),
            ],
            MetricKind::Memory => vec![
                StateRange::new(0.0, 80.0, "low", Severity::Ready, "Memory usage is lower than 80%"),
                StateRange::new(80.0, 90.0, "medium", Severity::Warning, "Memory usage is lower than 90%"),
                StateRange::new(90.0, 100.0, "high", Severity::Error, "Memory usage is higher than 90%"),
            ],
            MetricKind::Swap => vec![
                StateRange::new(0.0, 10.0, "low", Severity::Ready, "Swap usage is lower than 10%"),
                StateRange::new(10.0, 80.0, "low", Severity::Ready, "Swap usage is lower than 80%"),
                StateRange::new(80.0, 90.0, "medium", Severity::Warning, "Swap usage is lower than 90%"),
                StateRange::new(90.0, 100.0, "high", Severity::Error, "Swap usage is higher than 90%"),
            ],
            MetricKind::Disk { .. } => vec![StateRange::new(
                0.0,
                f64::MAX,
                "active",
                Severity::Ready,
                "Disk throughput",
            )],
            MetricKind::Uptime => vec![StateRange::new(
                0.0,
                f64::MAX,
                "up",
                Severity::Unimportant,
                "System uptime",
            )],
        }
    }
}

/// Render an uptime like "3 days, 1 hour and 5 minutes"
pub fn format_uptime(secs: u64) -> String {
    if secs < 60 {
        return "Less than one minute".to_string();
    }

    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3_600;
    let minutes = (secs % 3_600) / 60;

    let plural = |n: u64, word: &str| {
        if n > 1 {
            format!("{} {}s", n, word)
        } else {
            format!("{} {}", n, word)
        }
    };

    let parts: Vec<String> = [(days, "day"), (hours, "hour"), (minutes, "minute")]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, word)| plural(n, word))
        .collect();

    match parts.as_slice() {
        [only] => only.clone(),
        [first, second] => format!("{} and {}", first, second),
        [first, second, third] => format!("{}, {} and {}", first, second, third),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::StateClassifier;
    use crate::delta::{delta, DeltaOutcome};
    use crate::models::UNITS;

    fn interval(prev: &CounterSnapshot, now: &CounterSnapshot) -> Delta {
        match delta(prev, now) {
            DeltaOutcome::Updated(d) => d,
            DeltaOutcome::NoUpdate => panic!("expected an update"),
        }
    }

    #[test]
    fn test_default_states_validate_against_domain() {
        let kinds = [
            MetricKind::Cpu {
                selector: CpuSelector::Active,
            },
            MetricKind::Memory,
            MetricKind::Swap,
            MetricKind::Disk {
                device: None,
                direction: DiskDirection::Read,
                unit: &UNITS[2],
            },
            MetricKind::Uptime,
            MetricKind::LoadAverage {
                window: LoadWindow::Five,
            },
        ];

        for kind in kinds {
            assert!(
                StateClassifier::new(kind.default_states(), kind.domain()).is_ok(),
                "default states for {} are invalid",
                kind.name()
            );
        }
    }

    #[test]
    fn test_disk_throughput_in_configured_unit() {
        let kind = MetricKind::Disk {
            device: Some("sda".to_string()),
            direction: DiskDirection::Read,
            unit: &UNITS[2],
        };
        let prev = CounterSnapshot::from_counters(0, [("read.blocks", 1000), ("write.blocks", 0)]);
        let now = CounterSnapshot::from_counters(1000, [("read.blocks", 3000), ("write.blocks", 0)]);

        let value = kind.compute(&interval(&prev, &now), &now, 512).unwrap();
        assert!((value - 0.9766).abs() < 1e-4);
        assert_eq!(kind.display(value), "0.98 MB/s");
    }

    #[test]
    fn test_disk_average_direction() {
        let kind = MetricKind::Disk {
            device: None,
            direction: DiskDirection::Average,
            unit: &UNITS[0],
        };
        let prev = CounterSnapshot::from_counters(0, [("read.blocks", 0), ("write.blocks", 0)]);
        let now = CounterSnapshot::from_counters(2000, [("read.blocks", 8), ("write.blocks", 4)]);

        // 8 KiB read and 4 KiB written over 2 s
        let value = kind.compute(&interval(&prev, &now), &now, 1024).unwrap();
        assert_eq!(value, 3072.0);
    }

    #[test]
    fn test_memory_percent() {
        let snap = CounterSnapshot::from_counters(
            10,
            [("MemTotal", 8 * 1024 * 1024), ("MemAvailable", 2 * 1024 * 1024)],
        );
        let prev = CounterSnapshot::from_counters(0, [("MemTotal", 0)]);
        let value = MetricKind::Memory
            .compute(&interval(&prev, &snap), &snap, 512)
            .unwrap();
        assert_eq!(value, 75.0);
        assert_eq!(MetricKind::Memory.display(value), "75.00%");
    }

    #[test]
    fn test_swap_without_swap_space_is_zero() {
        let snap = CounterSnapshot::from_counters(10, [("SwapTotal", 0), ("SwapFree", 0)]);
        let prev = CounterSnapshot::from_counters(0, [("SwapTotal", 0)]);
        let value = MetricKind::Swap
            .compute(&interval(&prev, &snap), &snap, 512)
            .unwrap();
        assert_eq!(value, 0.0);
    }

    #[test]
    fn test_gauge_missing_counter() {
        let snap = CounterSnapshot::from_counters(10, [("MemTotal", 100)]);
        let prev = CounterSnapshot::from_counters(0, [("MemTotal", 100)]);
        let err = MetricKind::Memory
            .compute(&interval(&prev, &snap), &snap, 512)
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingField("MemAvailable".to_string()));
    }

    #[test]
    fn test_load_average_percent_is_clamped() {
        let kind = MetricKind::LoadAverage {
            window: LoadWindow::One,
        };
        let prev = CounterSnapshot::from_counters(0, [("cores", 4)]);

        let snap = CounterSnapshot::from_counters(10, [("load1", 200), ("cores", 4)]);
        assert_eq!(kind.compute(&interval(&prev, &snap), &snap, 0).unwrap(), 50.0);

        let snap = CounterSnapshot::from_counters(10, [("load1", 900), ("cores", 4)]);
        assert_eq!(kind.compute(&interval(&prev, &snap), &snap, 0).unwrap(), 100.0);
    }

    #[test]
    fn test_load_window_from_minutes() {
        assert_eq!(LoadWindow::from_minutes(15).unwrap().counter(), "load15");
        assert_eq!(
            LoadWindow::from_minutes(10),
            Err(ConfigError::UnknownLoadWindow(10))
        );
    }

    #[test]
    fn test_disk_direction_parse() {
        assert_eq!("Write".parse::<DiskDirection>().unwrap(), DiskDirection::Write);
        assert!("sideways".parse::<DiskDirection>().is_err());
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(59), "Less than one minute");
        assert_eq!(format_uptime(60), "1 minute");
        assert_eq!(format_uptime(7_200), "2 hours");
        assert_eq!(format_uptime(86_400), "1 day");
        assert_eq!(format_uptime(86_400 + 120), "1 day and 2 minutes");
        assert_eq!(format_uptime(3 * 86_400 + 3_600 + 300), "3 days, 1 hour and 5 minutes");
        assert_eq!(format_uptime(3_600 + 60), "1 hour and 1 minute");
    }
}
