//! Delta sampling and rate normalization for system usage metrics
//!
//! This crate provides:
//! - Counter deltas that survive resets and wraparound
//! - CPU tick shares and disk throughput normalization
//! - Threshold classification with state change detection
//! - Linux procfs counter sources
//! - A collection loop with health checks and Prometheus metrics

pub mod classify;
pub mod collector;
pub mod config;
pub mod delta;
pub mod error;
pub mod health;
pub mod kind;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod source;

pub use classify::{classify, transition, Domain, StateClassifier};
pub use collector::{
    CollectionLoop, CollectionLoopBuilder, MetricCollector, MetricHandle, MetricRegistry,
    RefreshOutcome, StateChange,
};
pub use config::{KindName, MetricConfig, MetricDefinition};
pub use delta::{counter_delta, delta, Delta, DeltaOutcome};
pub use error::{CollectorError, ConfigError, SourceError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
    UNHEALTHY_AFTER_FAILURES,
};
pub use kind::{DiskDirection, LoadWindow, MetricKind};
pub use models::*;
pub use normalize::{fractions, percent_used, speed, CpuField, CpuFractions, CpuSelector};
pub use observability::{StructuredLogger, SysusageMetrics};
pub use source::{CounterSource, ProcFs};
