//! sysusage agent
//!
//! Samples kernel counters on a fixed schedule, classifies every metric
//! against its configured states and serves health and Prometheus endpoints.

use anyhow::{Context, Result};
use std::sync::Arc;
use sysusage::{
    CollectionLoopBuilder, HealthRegistry, MetricCollector, MetricRegistry, ProcFs,
    StructuredLogger, SysusageMetrics,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        proc_root = %config.proc_root.display(),
        metrics = config.metrics.len(),
        "Agent configured"
    );

    let logger = StructuredLogger::new(&config.node_name);
    let metrics = SysusageMetrics::new();
    let definitions = config.definitions(&logger)?;

    // Every collector takes its first sample here; one failure stops the agent
    let procfs = ProcFs::with_roots(&config.proc_root, &config.sys_root);
    let registry = MetricRegistry::new();
    let mut collectors = Vec::with_capacity(definitions.len());
    for definition in definitions {
        let name = definition.name.clone();
        let source = procfs
            .source_for(&definition.kind)
            .await
            .with_context(|| format!("No counter source for metric '{}'", name))?;
        let collector = MetricCollector::new(definition, source)
            .await
            .with_context(|| format!("Metric '{}' failed to come online", name))?;
        registry.register(name, collector.handle());
        collectors.push(collector);
    }

    let health_registry = HealthRegistry::new();
    let (collection_loop, mut changes) = CollectionLoopBuilder::new()
        .collectors(collectors)
        .health(health_registry.clone())
        .logger(logger.clone())
        .build()?;
    let metric_count = collection_loop.len();

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(collection_loop.run(shutdown_rx));

    let changes_handle = tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            debug!(
                metric = %change.metric,
                value = change.value,
                state = %change.state.label(),
                "State change delivered"
            );
        }
    });

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    health_registry.set_ready(true).await;
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    logger.log_startup(AGENT_VERSION, metric_count);

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;

    let _ = shutdown_tx.send(());
    join_task(loop_handle, "collection loop").await;
    join_task(changes_handle, "state change listener").await;

    for reading in registry.list() {
        info!(
            metric = %reading.metric,
            value = %reading.display,
            state = %reading.state.label(),
            samples = reading.samples,
            "Final reading"
        );
    }

    api_handle.abort();
    Ok(())
}

/// Wait for a background task; returns false if it panicked or was cancelled
async fn join_task(handle: JoinHandle<()>, task: &str) -> bool {
    match handle.await {
        Ok(()) => true,
        Err(e) => {
            warn!(task = task, error = %e, "Task terminated abnormally");
            false
        }
    }
}
