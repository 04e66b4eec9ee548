//! CPU tick counters from /proc/stat
//!
//! Only the aggregate `cpu` line is used:
//! `cpu  user nice system idle iowait irq softirq steal guest guest_nice`

use super::{monotonic_ms, parse_counter, read_text, CounterSource};
use crate::error::SourceError;
use crate::models::CounterSnapshot;
use crate::normalize::CpuField;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Columns every kernel since 2.4 reports
const MIN_COLUMNS: usize = 4;

pub struct ProcStatSource {
    path: PathBuf,
}

impl ProcStatSource {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            path: proc_root.join("stat"),
        }
    }

    /// Parse the aggregate CPU line into `(field, ticks)` pairs.
    ///
    /// Columns missing on older kernels read as zero.
    pub fn parse(path: &Path, content: &str) -> Result<Vec<(&'static str, u64)>, SourceError> {
        let line = content
            .lines()
            .find(|line| line.split_whitespace().next() == Some("cpu"))
            .ok_or_else(|| SourceError::malformed(path, "no aggregate cpu line"))?;

        let columns: Vec<&str> = line.split_whitespace().skip(1).collect();
        if columns.len() < MIN_COLUMNS {
            return Err(SourceError::malformed(
                path,
                format!("expected at least {} cpu columns, found {}", MIN_COLUMNS, columns.len()),
            ));
        }

        CpuField::ALL
            .iter()
            .enumerate()
            .map(|(ix, field)| -> Result<(&'static str, u64), SourceError> {
                let ticks = match columns.get(ix) {
                    Some(raw) => parse_counter(path, field.name(), raw)?,
                    None => 0,
                };
                Ok((field.name(), ticks))
            })
            .collect()
    }
}

#[async_trait]
impl CounterSource for ProcStatSource {
    async fn sample(&self) -> Result<CounterSnapshot, SourceError> {
        let content = read_text(&self.path).await?;
        let counters = Self::parse(&self.path, &content)?;
        Ok(CounterSnapshot::from_counters(monotonic_ms(), counters))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROC_STAT: &str = "cpu  10132153 290696 3084719 46828483 16683 0 25195 0 175628 0
cpu0 1393280 32966 572056 13343292 6130 0 17875 0 23933 0
intr 1462898 0 0
ctxt 19350112
btime 1700000000
";

    #[test]
    fn test_parse_aggregate_line() {
        let fields = ProcStatSource::parse(Path::new("/proc/stat"), PROC_STAT).unwrap();

        assert_eq!(fields.len(), 10);
        assert_eq!(fields[0], ("user", 10132153));
        assert_eq!(fields[3], ("idle", 46828483));
        assert_eq!(fields[8], ("guest", 175628));
        assert_eq!(fields[9], ("guest_nice", 0));
    }

    #[test]
    fn test_parse_short_line_pads_with_zero() {
        let fields = ProcStatSource::parse(Path::new("/proc/stat"), "cpu 1 2 3 4\n").unwrap();
        assert_eq!(fields[3], ("idle", 4));
        assert_eq!(fields[7], ("steal", 0));
    }

    #[test]
    fn test_parse_rejects_truncated_line() {
        let err = ProcStatSource::parse(Path::new("/proc/stat"), "cpu 1 2\n").unwrap_err();
        assert!(matches!(err, SourceError::Malformed { .. }));
    }

    #[test]
    fn test_parse_rejects_missing_cpu_line() {
        let err = ProcStatSource::parse(Path::new("/proc/stat"), "cpu0 1 2 3 4\n").unwrap_err();
        assert!(err.to_string().contains("no aggregate cpu line"));
    }
}
