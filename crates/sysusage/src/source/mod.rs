//! Counter sources
//!
//! A counter source produces [`CounterSnapshot`]s for one metric. The
//! engine never parses kernel text itself; it only sees named counters and
//! a monotonic timestamp. [`ProcFs`] builds the Linux implementations:
//! - `/proc/stat` for CPU ticks
//! - `/proc/meminfo` for memory and swap
//! - `/proc/diskstats` and `/sys/block/<dev>/stat` for disk I/O
//! - `/proc/uptime` and `/proc/loadavg` for gauges

mod diskstats;
mod loadavg;
mod meminfo;
mod proc_stat;
mod uptime;

pub use diskstats::{DiskStatSource, DiskStats, DEFAULT_BLOCK_SIZE};
pub use loadavg::LoadAvgSource;
pub use meminfo::MemInfoSource;
pub use proc_stat::ProcStatSource;
pub use uptime::UptimeSource;

use crate::error::SourceError;
use crate::kind::MetricKind;
use crate::models::CounterSnapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::fs;

/// Producer of counter snapshots for one metric
#[async_trait]
pub trait CounterSource: Send + Sync {
    /// Take a snapshot of the current counters
    async fn sample(&self) -> Result<CounterSnapshot, SourceError>;

    /// Size in bytes of the blocks counted by this source, if it has any
    async fn block_size(&self) -> Option<u64> {
        None
    }

    /// Short description used in logs
    fn describe(&self) -> String;
}

/// Milliseconds since the first call in this process, never decreasing
pub fn monotonic_ms() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_millis() as u64
}

/// Builder for the Linux procfs/sysfs counter sources
#[derive(Debug, Clone)]
pub struct ProcFs {
    proc_root: PathBuf,
    sys_root: PathBuf,
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcFs {
    pub fn new() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
        }
    }

    /// Use alternative roots (for testing or containers with a host mount)
    pub fn with_roots(proc_root: impl Into<PathBuf>, sys_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
            sys_root: sys_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    /// Build the source that feeds `kind`
    pub async fn source_for(&self, kind: &MetricKind) -> Result<Arc<dyn CounterSource>, SourceError> {
        let source: Arc<dyn CounterSource> = match kind {
            MetricKind::Cpu { .. } => Arc::new(ProcStatSource::new(&self.proc_root)),
            MetricKind::Memory | MetricKind::Swap => Arc::new(MemInfoSource::new(&self.proc_root)),
            MetricKind::Disk { device, .. } => Arc::new(DiskStatSource::new(
                &self.proc_root,
                &self.sys_root,
                device.as_deref(),
            )),
            MetricKind::Uptime => Arc::new(UptimeSource::new(&self.proc_root)),
            MetricKind::LoadAverage { .. } => {
                Arc::new(LoadAvgSource::probe(&self.proc_root).await?)
            }
        };
        Ok(source)
    }
}

/// Read a kernel text file
pub(crate) async fn read_text(path: &Path) -> Result<String, SourceError> {
    fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::io(path, e))
}

/// Parse one numeric column
pub(crate) fn parse_counter(path: &Path, name: &str, raw: &str) -> Result<u64, SourceError> {
    raw.parse()
        .map_err(|_| SourceError::malformed(path, format!("invalid value '{}' for {}", raw, name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_ms_never_decreases() {
        let a = monotonic_ms();
        let b = monotonic_ms();
        assert!(b >= a);
    }

    #[tokio::test]
    async fn test_read_text_missing_file() {
        let err = read_text(Path::new("/nonexistent/sysusage/stat"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/sysusage/stat"));
    }

    #[test]
    fn test_parse_counter() {
        let path = Path::new("/proc/stat");
        assert_eq!(parse_counter(path, "user", "42").unwrap(), 42);
        assert!(matches!(
            parse_counter(path, "user", "4x2"),
            Err(SourceError::Malformed { .. })
        ));
    }
}
