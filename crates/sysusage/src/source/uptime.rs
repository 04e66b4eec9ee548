//! Seconds since boot from /proc/uptime

use super::{monotonic_ms, read_text, CounterSource};
use crate::error::SourceError;
use crate::models::CounterSnapshot;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub struct UptimeSource {
    path: PathBuf,
}

impl UptimeSource {
    pub fn new(proc_root: &Path) -> Self {
        Self {
            path: proc_root.join("uptime"),
        }
    }

    /// Whole seconds from the first column (`"350735.47 234388.90"`)
    pub fn parse(path: &Path, content: &str) -> Result<u64, SourceError> {
        let raw = content
            .split_whitespace()
            .next()
            .ok_or_else(|| SourceError::malformed(path, "empty file"))?;
        let secs: f64 = raw
            .parse()
            .map_err(|_| SourceError::malformed(path, format!("invalid uptime '{}'", raw)))?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(SourceError::malformed(path, format!("invalid uptime '{}'", raw)));
        }
        Ok(secs as u64)
    }
}

#[async_trait]
impl CounterSource for UptimeSource {
    async fn sample(&self) -> Result<CounterSnapshot, SourceError> {
        let content = read_text(&self.path).await?;
        let secs = Self::parse(&self.path, &content)?;
        Ok(CounterSnapshot::from_counters(monotonic_ms(), [("uptime", secs)]))
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uptime() {
        let path = Path::new("/proc/uptime");
        assert_eq!(UptimeSource::parse(path, "350735.47 234388.90\n").unwrap(), 350735);
        assert_eq!(UptimeSource::parse(path, "12 0").unwrap(), 12);
    }

    #[test]
    fn test_parse_uptime_rejects_garbage() {
        let path = Path::new("/proc/uptime");
        assert!(UptimeSource::parse(path, "").is_err());
        assert!(UptimeSource::parse(path, "soon").is_err());
        assert!(UptimeSource::parse(path, "-4.0 1.0").is_err());
    }
}
