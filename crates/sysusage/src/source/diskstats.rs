//! Block device I/O counters
//!
//! See the kernel's Documentation/block/stat.rst and iostats.rst. A single
//! device is read from `/sys/block/<dev>/stat`; without a device every whole
//! disk listed in `/proc/diskstats` is summed.

use super::{monotonic_ms, parse_counter, read_text, CounterSource};
use crate::error::SourceError;
use crate::models::CounterSnapshot;
use async_trait::async_trait;
use std::ops::AddAssign;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sector size the kernel uses for its block counters
pub const DEFAULT_BLOCK_SIZE: u64 = 512;

/// Counter names in kernel column order
pub const DISK_FIELDS: [&str; 15] = [
    "read.count",
    "read.merged",
    "read.blocks",
    "read.time",
    "write.count",
    "write.merged",
    "write.blocks",
    "write.time",
    "io.inprogress",
    "io.time",
    "io.weighted",
    "discards.count",
    "discards.merged",
    "discards.blocks",
    "discards.time",
];

/// Kernels before 4.18 report no discard columns
const MIN_COLUMNS: usize = 11;

/// I/O counters of one device (or a sum of devices)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskStats {
    pub major: u32,
    pub minor: u32,
    pub name: String,
    pub counters: [u64; 15],
}

impl DiskStats {
    /// Whole disk rather than a partition or virtual device
    pub fn is_physical(&self) -> bool {
        self.major != 0 && self.minor == 0
    }

    pub fn get(&self, field: &str) -> Option<u64> {
        DISK_FIELDS
            .iter()
            .position(|f| *f == field)
            .map(|ix| self.counters[ix])
    }

    fn parse_columns(path: &Path, columns: &[&str]) -> Result<[u64; 15], SourceError> {
        if columns.len() < MIN_COLUMNS {
            return Err(SourceError::malformed(
                path,
                format!("expected at least {} columns, found {}", MIN_COLUMNS, columns.len()),
            ));
        }

        let mut counters = [0u64; 15];
        for (ix, name) in DISK_FIELDS.iter().enumerate() {
            if let Some(raw) = columns.get(ix) {
                counters[ix] = parse_counter(path, name, raw)?;
            }
        }
        Ok(counters)
    }

    /// Parse a `/sys/block/<dev>/stat` file
    pub fn parse_sysfs(path: &Path, name: &str, content: &str) -> Result<Self, SourceError> {
        let columns: Vec<&str> = content.split_whitespace().collect();
        Ok(Self {
            name: name.to_string(),
            counters: Self::parse_columns(path, &columns)?,
            ..Default::default()
        })
    }

    /// Parse one `/proc/diskstats` line: `major minor name <counters>`
    pub fn parse_line(path: &Path, line: &str) -> Result<Self, SourceError> {
        let columns: Vec<&str> = line.split_whitespace().collect();
        let [major, minor, name, rest @ ..] = columns.as_slice() else {
            return Err(SourceError::malformed(path, format!("short line '{}'", line.trim())));
        };

        let number = |raw: &str| {
            raw.parse::<u32>()
                .map_err(|_| SourceError::malformed(path, format!("invalid device number '{}'", raw)))
        };

        Ok(Self {
            major: number(*major)?,
            minor: number(*minor)?,
            name: name.to_string(),
            counters: Self::parse_columns(path, rest)?,
        })
    }

    /// Parse every line of `/proc/diskstats`
    pub fn parse_all(path: &Path, content: &str) -> Result<Vec<Self>, SourceError> {
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Self::parse_line(path, line))
            .collect()
    }
}

impl AddAssign<&DiskStats> for DiskStats {
    fn add_assign(&mut self, other: &DiskStats) {
        self.major = 0;
        self.minor = 0;
        self.name.clear();
        for (mine, theirs) in self.counters.iter_mut().zip(other.counters.iter()) {
            *mine = mine.saturating_add(*theirs);
        }
    }
}

/// Disk counters for one device or for all physical disks
pub struct DiskStatSource {
    device: Option<String>,
    proc_path: PathBuf,
    sys_block: PathBuf,
}

impl DiskStatSource {
    pub fn new(proc_root: &Path, sys_root: &Path, device: Option<&str>) -> Self {
        let device = device
            .map(|d| d.trim())
            .map(|d| d.strip_prefix("/dev/").unwrap_or(d))
            .filter(|d| !d.is_empty())
            .map(str::to_string);

        Self {
            device,
            proc_path: proc_root.join("diskstats"),
            sys_block: sys_root.join("block"),
        }
    }

    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    /// Current counters, summed over physical disks when no device is set
    pub async fn stats(&self) -> Result<DiskStats, SourceError> {
        match &self.device {
            Some(device) => {
                let path = self.sys_block.join(device).join("stat");
                let content = read_text(&path).await?;
                DiskStats::parse_sysfs(&path, device, &content)
            }
            None => {
                let content = read_text(&self.proc_path).await?;
                let mut total = DiskStats::default();
                for disk in DiskStats::parse_all(&self.proc_path, &content)?
                    .iter()
                    .filter(|d| d.is_physical())
                {
                    total += disk;
                }
                Ok(total)
            }
        }
    }
}

#[async_trait]
impl CounterSource for DiskStatSource {
    async fn sample(&self) -> Result<CounterSnapshot, SourceError> {
        let stats = self.stats().await?;
        Ok(CounterSnapshot::from_counters(
            monotonic_ms(),
            DISK_FIELDS.iter().copied().zip(stats.counters),
        ))
    }

    async fn block_size(&self) -> Option<u64> {
        let device = self.device.as_ref()?;
        let path = self
            .sys_block
            .join(device)
            .join("queue")
            .join("logical_block_size");

        match read_text(&path).await {
            Ok(content) => content.trim().parse().ok().filter(|size| *size > 0),
            Err(e) => {
                debug!(device = %device, error = %e, "Block size unavailable");
                None
            }
        }
    }

    fn describe(&self) -> String {
        match &self.device {
            Some(device) => self.sys_block.join(device).join("stat").display().to_string(),
            None => format!("{} (all disks)", self.proc_path.display()),
        }
    }
}
