//! Agent configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use sysusage::{MetricConfig, MetricDefinition, StructuredLogger};

/// Config file used when `SYSUSAGE_CONFIG` is not set
const DEFAULT_CONFIG_FILE: &str = "sysusage.toml";

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Name reported in structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// API server port for health/metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Mount point of procfs
    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    /// Mount point of sysfs
    #[serde(default = "default_sys_root")]
    pub sys_root: PathBuf,

    /// Monitored metrics
    #[serde(default = "MetricConfig::defaults")]
    pub metrics: Vec<MetricConfig>,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_sys_root() -> PathBuf {
    PathBuf::from("/sys")
}

impl AgentConfig {
    /// Load configuration from the config file and `SYSUSAGE_*` variables
    pub fn load() -> Result<Self> {
        let path = std::env::var("SYSUSAGE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    /// Load from `path` (optional) overlaid with the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix("SYSUSAGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        config
            .try_deserialize()
            .context("Invalid agent configuration")
    }

    /// Validate every metric; any rejected metric stops the agent
    pub fn definitions(&self, logger: &StructuredLogger) -> Result<Vec<MetricDefinition>> {
        let mut definitions = Vec::with_capacity(self.metrics.len());
        let mut names = HashSet::new();
        let mut rejected = 0usize;

        for metric in &self.metrics {
            match metric.validate() {
                Ok(definition) => {
                    if !names.insert(definition.name.clone()) {
                        logger.log_configuration_rejected(&definition.name, "duplicate metric name");
                        rejected += 1;
                        continue;
                    }
                    definitions.push(definition);
                }
                Err(e) => {
                    logger.log_configuration_rejected(&metric.name, &e.to_string());
                    rejected += 1;
                }
            }
        }

        if rejected > 0 {
            anyhow::bail!("{} metric configuration(s) rejected", rejected);
        }
        if definitions.is_empty() {
            anyhow::bail!("No metrics configured");
        }
        Ok(definitions)
    }
}
