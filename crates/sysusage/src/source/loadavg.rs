//! Load averages from /proc/loadavg
//!
//! Values are stored in hundredths (`0.52` becomes `52`) so they fit the
//! integer counter model. The number of online cores is read once from
//! /proc/cpuinfo when the source is built.

use super::{monotonic_ms, read_text, CounterSource};
use crate::error::SourceError;
use crate::models::CounterSnapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LoadAvgSource {
    path: PathBuf,
    cores: u64,
}

impl LoadAvgSource {
    /// Build a source for a known core count
    pub fn new(proc_root: &Path, cores: u64) -> Self {
        Self {
            path: proc_root.join("loadavg"),
            cores: cores.max(1),
        }
    }

    /// Count cores from `<proc_root>/cpuinfo`, falling back to one
    pub async fn probe(proc_root: &Path) -> Result<Self, SourceError> {
        let cpuinfo = proc_root.join("cpuinfo");
        let cores = match read_text(&cpuinfo).await {
            Ok(content) => Self::count_cores(&content),
            Err(e) => {
                debug!(error = %e, "Could not read cpuinfo, assuming a single core");
                1
            }
        };
        Ok(Self::new(proc_root, cores))
    }

    pub fn count_cores(cpuinfo: &str) -> u64 {
        let count = cpuinfo
            .lines()
            .filter(|line| {
                line.split_once(':')
                    .map(|(key, _)| key.trim() == "processor")
                    .unwrap_or(false)
            })
            .count() as u64;
        count.max(1)
    }

    /// Parse the three averages, in hundredths
    pub fn parse(path: &Path, content: &str) -> Result<[(&'static str, u64); 3], SourceError> {
        let mut columns = content.split_whitespace();
        let mut next = |name: &'static str| -> Result<(&'static str, u64), SourceError> {
            let raw = columns
                .next()
                .ok_or_else(|| SourceError::malformed(path, format!("missing {}", name)))?;
            let value: f64 = raw
                .parse()
                .map_err(|_| SourceError::malformed(path, format!("invalid {} '{}'", name, raw)))?;
            if !value.is_finite() || value < 0.0 {
                return Err(SourceError::malformed(path, format!("invalid {} '{}'", name, raw)));
            }
            Ok((name, (value * 100.0).round() as u64))
        };

        Ok([next("load1")?, next("load5")?, next("load15")?])
    }
}

#[async_trait]
impl CounterSource for LoadAvgSource {
    async fn sample(&self) -> Result<CounterSnapshot, SourceError> {
        let content = read_text(&self.path).await?;
        let averages = Self::parse(&self.path, &content)?;
        let counters = averages.into_iter().chain([("cores", self.cores)]);
        Ok(CounterSnapshot::from_counters(monotonic_ms(), counters))
    }

    fn describe(&self) -> String {
        format!("{} ({} cores)", self.path.display(), self.cores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_loadavg() {
        let path = Path::new("/proc/loadavg");
        let parsed = LoadAvgSource::parse(path, "0.52 1.05 2.50 1/389 12345\n").unwrap();
        assert_eq!(parsed, [("load1", 52), ("load5", 105), ("load15", 250)]);
    }

    #[test]
    fn test_parse_loadavg_truncated() {
        let err = LoadAvgSource::parse(Path::new("/proc/loadavg"), "0.52 1.05").unwrap_err();
        assert!(err.to_string().contains("missing load15"));
    }

    #[test]
    fn test_count_cores() {
        let cpuinfo = "processor\t: 0\nmodel name\t: x\n\nprocessor\t: 1\nmodel name\t: x\n";
        assert_eq!(LoadAvgSource::count_cores(cpuinfo), 2);
        assert_eq!(LoadAvgSource::count_cores(""), 1);
    }

    #[tokio::test]
    async fn test_probe_and_sample() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("cpuinfo"), "processor : 0\nprocessor : 1\nprocessor : 2\nprocessor : 3\n").unwrap();
        std::fs::write(dir.path().join("loadavg"), "2.00 1.00 0.50 1/100 42\n").unwrap();

        let source = LoadAvgSource::probe(dir.path()).await.unwrap();
        let snap = source.sample().await.unwrap();

        assert_eq!(snap.get("load1"), Some(200));
        assert_eq!(snap.get("cores"), Some(4));
    }

    #[tokio::test]
    async fn test_probe_without_cpuinfo_assumes_one_core() {
        let dir = TempDir::new().unwrap();
        let source = LoadAvgSource::probe(dir.path()).await.unwrap();
        assert!(source.describe().contains("1 cores"));
    }
}
