//! Memory counters from /proc/meminfo
//!
//! Lines look like `MemTotal:       16318412 kB`. Values are expanded to
//! bytes: `k`/`kB` multiply by 1024, `M`/`MB` by 1024².

use super::{monotonic_ms, read_text, CounterSource};
use crate::error::SourceError;
use crate::models::CounterSnapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct MemInfoSource {
    path: PathBuf,
}

impl MemInfoSource {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            path: proc_root.join("meminfo"),
        }
    }

    /// Expand a value with an optional unit suffix into bytes
    pub fn scaled(raw: &str) -> Option<u64> {
        let raw = raw.trim();
        let digits_end = raw
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(raw.len());
        let value: u64 = raw[..digits_end].parse().ok()?;

        let multiplier = match raw[digits_end..].trim_start().chars().next() {
            Some('k') | Some('K') => 1024,
            Some('M') | Some('m') => 1024 * 1024,
            _ => 1,
        };
        Some(value.saturating_mul(multiplier))
    }

    /// Parse every `Name: value [unit]` line; unparsable lines are skipped
    pub fn parse(content: &str) -> Vec<(String, u64)> {
        content
            .lines()
            .filter_map(|line| {
                let (name, value) = line.split_once(':')?;
                Some((name.trim().to_string(), Self::scaled(value)?))
            })
            .collect()
    }
}

#[async_trait]
impl CounterSource for MemInfoSource {
    async fn sample(&self) -> Result<CounterSnapshot, SourceError> {
        let content = read_text(&self.path).await?;
        let counters = Self::parse(&content);
        if counters.is_empty() {
            return Err(SourceError::malformed(&self.path, "no counters found"));
        }
        Ok(CounterSnapshot::from_counters(monotonic_ms(), counters))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}
