//! Collection loop
//!
//! Owns the collectors and refreshes each one on its own interval in a
//! dedicated task. State changes are forwarded on a channel; health and
//! Prometheus metrics are updated after every refresh.

use super::{MetricCollector, RefreshOutcome, StateChange};
use crate::health::HealthRegistry;
use crate::observability::{StructuredLogger, SysusageMetrics};
use anyhow::Result;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Default capacity of the state change channel
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Shared by every collector task
#[derive(Clone)]
struct RefreshContext {
    health: HealthRegistry,
    metrics: SysusageMetrics,
    logger: StructuredLogger,
    changes_tx: mpsc::Sender<StateChange>,
}

impl RefreshContext {
    /// Refresh once and report the result
    async fn refresh(&self, collector: &mut MetricCollector) {
        let start = Instant::now();
        let result = collector.refresh().await;
        self.metrics
            .observe_refresh_latency(start.elapsed().as_secs_f64());

        match result {
            Ok(RefreshOutcome::NoUpdate) => {}
            Ok(RefreshOutcome::Updated { value, state }) => {
                self.metrics.set_value(collector.name(), value, state.severity());
                self.health.record_success(collector.name()).await;

                if state.changed {
                    self.metrics.inc_transitions(collector.name(), state.label());
                    if let Some(change) = collector.state_change() {
                        self.logger
                            .log_state_change(&change.metric, &change.display, &change.state);
                        if let Err(e) = self.changes_tx.send(change).await {
                            debug!(error = %e, "State change receiver dropped");
                        }
                    }
                }
            }
            Err(e) => {
                self.metrics.inc_refresh_errors(collector.name());
                let health = self
                    .health
                    .record_failure(collector.name(), e.to_string())
                    .await;
                self.logger.log_refresh_failed(
                    collector.name(),
                    &e.to_string(),
                    health.consecutive_failures,
                );
            }
        }
    }
}

/// Periodic refresh of a set of collectors
pub struct CollectionLoop {
    collectors: Vec<MetricCollector>,
    context: RefreshContext,
}

impl CollectionLoop {
    pub fn new(
        collectors: Vec<MetricCollector>,
        health: HealthRegistry,
        logger: StructuredLogger,
        buffer_size: usize,
    ) -> (Self, mpsc::Receiver<StateChange>) {
        let (changes_tx, changes_rx) = mpsc::channel(buffer_size.max(1));

        let loop_instance = Self {
            collectors,
            context: RefreshContext {
                health,
                metrics: SysusageMetrics::new(),
                logger,
                changes_tx,
            },
        };

        (loop_instance, changes_rx)
    }

    pub fn len(&self) -> usize {
        self.collectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collectors.is_empty()
    }

    /// Run until `shutdown` fires or its sender is dropped
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let count = self.collectors.len();
        info!(collectors = count, "Starting metric collection loop");

        for collector in &self.collectors {
            self.context.health.register(collector.name()).await;
        }
        self.context.metrics.set_collectors_online(count as i64);

        // Tasks subscribe here so none can miss the stop signal
        let (stop_tx, _) = broadcast::channel(1);
        let handles: Vec<JoinHandle<()>> = self
            .collectors
            .into_iter()
            .map(|collector| {
                let context = self.context.clone();
                tokio::spawn(run_collector(collector, context, stop_tx.subscribe()))
            })
            .collect();

        match shutdown.recv().await {
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                debug!("Shutdown requested");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("Shutdown sender dropped");
            }
        }
        let _ = stop_tx.send(());

        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Collector task failed");
            }
        }

        self.context.metrics.set_collectors_online(0);
        info!("Metric collection loop stopped");
    }
}

async fn run_collector(
    mut collector: MetricCollector,
    context: RefreshContext,
    mut shutdown: broadcast::Receiver<()>,
) {
    let period = collector.interval();
    // The first sample was taken at construction
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    context.logger.log_metric_online(
        collector.name(),
        &collector.describe_source(),
        period.as_secs(),
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                context.refresh(&mut collector).await;
            }
            _ = shutdown.recv() => {
                debug!(metric = %collector.name(), "Stopping collector");
                break;
            }
        }
    }
}

/// Builder for the collection loop
pub struct CollectionLoopBuilder {
    collectors: Vec<MetricCollector>,
    health: Option<HealthRegistry>,
    logger: Option<StructuredLogger>,
    buffer_size: usize,
}

impl CollectionLoopBuilder {
    pub fn new() -> Self {
        Self {
            collectors: Vec::new(),
            health: None,
            logger: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn collector(mut self, collector: MetricCollector) -> Self {
        self.collectors.push(collector);
        self
    }

    pub fn collectors(mut self, collectors: impl IntoIterator<Item = MetricCollector>) -> Self {
        self.collectors.extend(collectors);
        self
    }

    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Capacity of the state change channel
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn build(self) -> Result<(CollectionLoop, mpsc::Receiver<StateChange>)> {
        if self.collectors.is_empty() {
            anyhow::bail!("At least one collector is required");
        }
        let health = self
            .health
            .ok_or_else(|| anyhow::anyhow!("Health registry is required"))?;
        let logger = self
            .logger
            .unwrap_or_else(|| StructuredLogger::new("localhost"));

        Ok(CollectionLoop::new(
            self.collectors,
            health,
            logger,
            self.buffer_size,
        ))
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
