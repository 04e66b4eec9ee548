//! Observability for the sampling agent
//!
//! Provides:
//! - Prometheus metrics (refresh latency, current values, severities, errors)
//! - Structured JSON logging of domain events with tracing

use crate::models::{ClassifiedState, Severity};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter_vec, register_int_gauge,
    register_int_gauge_vec, GaugeVec, Histogram, IntCounterVec, IntGauge, IntGaugeVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for refresh latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00005, 0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5,
];

static GLOBAL_METRICS: OnceLock<SysusageMetricsInner> = OnceLock::new();

struct SysusageMetricsInner {
    refresh_latency_seconds: Histogram,
    metric_value: GaugeVec,
    metric_severity: IntGaugeVec,
    state_transitions: IntCounterVec,
    refresh_errors: IntCounterVec,
    collectors_online: IntGauge,
}

impl SysusageMetricsInner {
    fn new() -> Self {
        Self {
            refresh_latency_seconds: register_histogram!(
                "sysusage_refresh_latency_seconds",
                "Time spent sampling and classifying one metric",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register refresh_latency_seconds"),

            metric_value: register_gauge_vec!(
                "sysusage_metric_value",
                "Last computed value of each metric",
                &["metric"]
            )
            .expect("Failed to register metric_value"),

            metric_severity: register_int_gauge_vec!(
                "sysusage_metric_severity",
                "Severity of the current state (0=unimportant, 1=ready, 2=warning, 3=error, 4=critical)",
                &["metric"]
            )
            .expect("Failed to register metric_severity"),

            state_transitions: register_int_counter_vec!(
                "sysusage_state_transitions_total",
                "Number of state changes per metric and target state",
                &["metric", "state"]
            )
            .expect("Failed to register state_transitions"),

            refresh_errors: register_int_counter_vec!(
                "sysusage_refresh_errors_total",
                "Number of failed refreshes per metric",
                &["metric"]
            )
            .expect("Failed to register refresh_errors"),

            collectors_online: register_int_gauge!(
                "sysusage_collectors_online",
                "Number of metric collectors currently running"
            )
            .expect("Failed to register collectors_online"),
        }
    }
}

/// Handle to the process-wide Prometheus metrics
///
/// Clones share the same underlying metrics.
#[derive(Clone)]
pub struct SysusageMetrics {
    _private: (),
}

impl Default for SysusageMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl SysusageMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(SysusageMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &SysusageMetricsInner {
        GLOBAL_METRICS.get_or_init(SysusageMetricsInner::new)
    }

    pub fn observe_refresh_latency(&self, duration_secs: f64) {
        self.inner().refresh_latency_seconds.observe(duration_secs);
    }

    /// Publish a freshly computed value and the severity of its state
    pub fn set_value(&self, metric: &str, value: f64, severity: Severity) {
        let inner = self.inner();
        inner.metric_value.with_label_values(&[metric]).set(value);
        inner
            .metric_severity
            .with_label_values(&[metric])
            .set(severity.level());
    }

    pub fn inc_transitions(&self, metric: &str, state: &str) {
        self.inner()
            .state_transitions
            .with_label_values(&[metric, state])
            .inc();
    }

    pub fn inc_refresh_errors(&self, metric: &str) {
        self.inner().refresh_errors.with_label_values(&[metric]).inc();
    }

    pub fn set_collectors_online(&self, count: i64) {
        self.inner().collectors_online.set(count);
    }
}

/// Structured logger for agent events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str, metrics: usize) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            metrics = metrics,
            "Sampling agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Sampling agent shutting down"
        );
    }

    /// A collector took its first sample and is refreshing
    pub fn log_metric_online(&self, metric: &str, source: &str, interval_secs: u64) {
        info!(
            event = "metric_online",
            node = %self.node_name,
            metric = %metric,
            source = %source,
            interval_secs = interval_secs,
            "Metric collector online"
        );
    }

    /// A metric moved into a different state range
    pub fn log_state_change(&self, metric: &str, value: &str, state: &ClassifiedState) {
        let severity = state.severity();
        let summary = state.range.as_ref().map(|r| r.summary.as_str()).unwrap_or("");

        if severity.is_alerting() {
            warn!(
                event = "state_changed",
                node = %self.node_name,
                metric = %metric,
                value = %value,
                state = %state.label(),
                severity = %severity,
                summary = %summary,
                "Metric entered alerting state"
            );
        } else {
            info!(
                event = "state_changed",
                node = %self.node_name,
                metric = %metric,
                value = %value,
                state = %state.label(),
                severity = %severity,
                summary = %summary,
                "Metric state changed"
            );
        }
    }

    /// A refresh failed; the previous value is kept
    pub fn log_refresh_failed(&self, metric: &str, error: &str, consecutive_failures: u32) {
        warn!(
            event = "refresh_failed",
            node = %self.node_name,
            metric = %metric,
            error = %error,
            consecutive_failures = consecutive_failures,
            "Metric refresh failed, keeping last value"
        );
    }

    pub fn log_configuration_rejected(&self, metric: &str, error: &str) {
        warn!(
            event = "configuration_rejected",
            node = %self.node_name,
            metric = %metric,
            error = %error,
            "Metric configuration rejected"
        );
    }
}
