//! Metric configuration
//!
//! [`MetricConfig`] is the plain, deserializable description of one metric.
//! [`MetricConfig::validate`] turns it into a [`MetricDefinition`]; every
//! configuration mistake is reported there, before any collector exists.

use crate::classify::StateClassifier;
use crate::error::ConfigError;
use crate::kind::{DiskDirection, LoadWindow, MetricKind};
use crate::models::{StateRange, Unit, DEFAULT_UNIT};
use crate::normalize::CpuSelector;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metric family as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindName {
    Cpu,
    Memory,
    Swap,
    Disk,
    Uptime,
    Loadavg,
}

/// Configuration of a single metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    pub name: String,
    pub kind: KindName,

    /// Seconds between refreshes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Throughput unit for disk metrics (B, KB, MB, GB)
    #[serde(default)]
    pub unit: Option<String>,

    /// CPU category (`user`, `idle`, ...), `active` when absent
    #[serde(default)]
    pub field: Option<String>,

    /// Disk device (`sda`, `/dev/nvme0n1`), all disks when absent
    #[serde(default)]
    pub device: Option<String>,

    /// Disk direction: read, write or average
    #[serde(default)]
    pub direction: Option<String>,

    /// Load average window in minutes
    #[serde(default)]
    pub window: Option<u8>,

    /// Threshold ranges, the built-in table for the kind when absent
    #[serde(default)]
    pub states: Option<Vec<StateRange>>,
}

fn default_interval_secs() -> u64 {
    10
}

/// A validated metric, ready to be turned into a collector
#[derive(Debug, Clone)]
pub struct MetricDefinition {
    pub name: String,
    pub kind: MetricKind,
    pub interval: Duration,
    pub classifier: StateClassifier,
}

impl MetricConfig {
    pub fn new(name: impl Into<String>, kind: KindName) -> Self {
        Self {
            name: name.into(),
            kind,
            interval_secs: default_interval_secs(),
            unit: None,
            field: None,
            device: None,
            direction: None,
            window: None,
            states: None,
        }
    }

    /// Metrics monitored when nothing is configured
    pub fn defaults() -> Vec<MetricConfig> {
        let mut load = MetricConfig::new("load1", KindName::Loadavg);
        load.window = Some(1);

        vec![
            MetricConfig::new("cpu", KindName::Cpu),
            MetricConfig::new("memory", KindName::Memory),
            MetricConfig::new("swap", KindName::Swap),
            MetricConfig::new("disk", KindName::Disk),
            MetricConfig {
                interval_secs: 60,
                ..MetricConfig::new("uptime", KindName::Uptime)
            },
            load,
        ]
    }

    fn resolve_kind(&self) -> Result<MetricKind, ConfigError> {
        let kind = match self.kind {
            KindName::Cpu => MetricKind::Cpu {
                selector: CpuSelector::parse(self.field.as_deref())?,
            },
            KindName::Memory => MetricKind::Memory,
            KindName::Swap => MetricKind::Swap,
            KindName::Disk => MetricKind::Disk {
                device: self.device.clone().filter(|d| !d.trim().is_empty()),
                direction: match &self.direction {
                    Some(direction) => direction.parse()?,
                    None => DiskDirection::Average,
                },
                unit: match &self.unit {
                    Some(unit) => Unit::lookup(unit)?,
                    None => DEFAULT_UNIT,
                },
            },
            KindName::Uptime => MetricKind::Uptime,
            KindName::Loadavg => MetricKind::LoadAverage {
                window: LoadWindow::from_minutes(self.window.unwrap_or(1))?,
            },
        };
        Ok(kind)
    }

    /// Check the configuration and build its definition
    pub fn validate(&self) -> Result<MetricDefinition, ConfigError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.interval_secs == 0 {
            return Err(ConfigError::ZeroInterval {
                metric: name.to_string(),
            });
        }

        let kind = self.resolve_kind()?;
        let states = self
            .states
            .clone()
            .unwrap_or_else(|| kind.default_states());
        let classifier = StateClassifier::new(states, kind.domain())?;

        Ok(MetricDefinition {
            name: name.to_string(),
            kind,
            interval: Duration::from_secs(self.interval_secs),
            classifier,
        })
    }
}
