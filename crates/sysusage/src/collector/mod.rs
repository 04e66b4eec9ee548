//! Metric collectors
//!
//! A [`MetricCollector`] runs one refresh cycle per call: take a snapshot,
//! compute the delta against the previous one, normalize it into a value,
//! classify the value and publish the result. Readers observe the latest
//! published [`MetricReading`] through a [`MetricHandle`].

mod r#loop;
mod registry;


pub use r#loop::{CollectionLoop, CollectionLoopBuilder};
pub use registry::MetricRegistry;

use crate::config::{MetricConfig, MetricDefinition};
use crate::delta::{delta, DeltaOutcome};
use crate::error::{CollectorError, ConfigError, SourceError};
use crate::models::{ClassifiedState, CounterSnapshot, MetricReading};
use crate::source::{CounterSource, ProcFs, DEFAULT_BLOCK_SIZE};
use serde::Serialize;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::debug;

/// Result of one refresh
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// No time elapsed since the previous snapshot; nothing was computed
    NoUpdate,
    Updated { value: f64, state: ClassifiedState },
}

impl RefreshOutcome {
    /// Whether the refresh moved the metric into a different state
    pub fn changed(&self) -> bool {
        match self {
            RefreshOutcome::NoUpdate => false,
            RefreshOutcome::Updated { state, .. } => state.changed,
        }
    }
}

/// Notification sent when a metric changes state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateChange {
    pub metric: String,
    pub value: f64,
    pub display: String,
    pub state: ClassifiedState,
    pub timestamp: i64,
}

/// Cloneable read access to the last published reading of a metric
#[derive(Debug, Clone)]
pub struct MetricHandle {
    reading: Arc<RwLock<Arc<MetricReading>>>,
}

impl MetricHandle {
    fn new(reading: MetricReading) -> Self {
        Self {
            reading: Arc::new(RwLock::new(Arc::new(reading))),
        }
    }

    /// Latest reading; never observes a partial update
    pub fn read(&self) -> Arc<MetricReading> {
        let guard = self.reading.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn publish(&self, reading: MetricReading) {
        let mut guard = self.reading.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(reading);
    }
}

/// Collector for one configured metric
pub struct MetricCollector {
    definition: MetricDefinition,
    source: Arc<dyn CounterSource>,
    block_size: u64,
    previous: CounterSnapshot,
    state: ClassifiedState,
    samples: u64,
    handle: MetricHandle,
}

impl MetricCollector {
    /// Bring a collector online by taking its first snapshot.
    ///
    /// Fails if the source cannot be read or lacks a counter the metric needs.
    pub async fn new(
        definition: MetricDefinition,
        source: Arc<dyn CounterSource>,
    ) -> Result<Self, CollectorError> {
        let first = source.sample().await?;
        for counter in definition.kind.required_counters() {
            if !first.contains(counter) {
                return Err(ConfigError::MissingField(counter.to_string()).into());
            }
        }

        let block_size = source.block_size().await.unwrap_or(DEFAULT_BLOCK_SIZE);
        debug!(
            metric = %definition.name,
            source = %source.describe(),
            block_size = block_size,
            counters = first.len(),
            "Initial sample taken"
        );

        let handle = MetricHandle::new(MetricReading::pending(&definition.name));
        Ok(Self {
            definition,
            source,
            block_size,
            previous: first,
            state: ClassifiedState::undefined(),
            samples: 0,
            handle,
        })
    }

    /// Validate `config` and build a collector on the matching procfs source
    pub async fn from_config(config: &MetricConfig, procfs: &ProcFs) -> Result<Self, CollectorError> {
        let definition = config.validate()?;
        let source = procfs.source_for(&definition.kind).await?;
        Self::new(definition, source).await
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &MetricDefinition {
        &self.definition
    }

    pub fn interval(&self) -> Duration {
        self.definition.interval
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn state(&self) -> &ClassifiedState {
        &self.state
    }

    pub fn describe_source(&self) -> String {
        self.source.describe()
    }

    pub fn handle(&self) -> MetricHandle {
        self.handle.clone()
    }

    /// Run one refresh cycle.
    ///
    /// On error the previous snapshot and state are kept and nothing is
    /// published.
    pub async fn refresh(&mut self) -> Result<RefreshOutcome, SourceError> {
        let current = self.source.sample().await?;
        for counter in self.definition.kind.required_counters() {
            if !current.contains(counter) {
                return Err(SourceError::MissingCounter(counter.to_string()));
            }
        }

        let interval = match delta(&self.previous, &current) {
            DeltaOutcome::NoUpdate => {
                debug!(metric = %self.definition.name, "No time elapsed, skipping update");
                return Ok(RefreshOutcome::NoUpdate);
            }
            DeltaOutcome::Updated(interval) => interval,
        };

        let value = self
            .definition
            .kind
            .compute(&interval, &current, self.block_size)
            .map_err(|e| match e {
                ConfigError::MissingField(field) => SourceError::MissingCounter(field),
                other => SourceError::MissingCounter(other.to_string()),
            })?;

        let state = self
            .definition
            .classifier
            .evaluate(value, self.state.index);

        self.previous = current;
        self.state = state.clone();
        self.samples += 1;

        self.handle.publish(MetricReading {
            metric: self.definition.name.clone(),
            value: Some(value),
            display: self.definition.kind.display(value),
            state: state.clone(),
            updated_at: Some(chrono::Utc::now().timestamp()),
            samples: self.samples,
        });

        Ok(RefreshOutcome::Updated { value, state })
    }

    /// Event describing the current state, for change notifications
    pub fn state_change(&self) -> Option<StateChange> {
        let reading = self.handle.read();
        Some(StateChange {
            metric: reading.metric.clone(),
            value: reading.value?,
            display: reading.display.clone(),
            state: reading.state.clone(),
            timestamp: reading.updated_at.unwrap_or_default(),
        })
    }
}
