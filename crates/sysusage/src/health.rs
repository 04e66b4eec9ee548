//! Health tracking for the sampling agent
//!
//! Every configured metric is a component. A failed refresh degrades it;
//! after [`UNHEALTHY_AFTER_FAILURES`] consecutive failures it is unhealthy
//! and the agent stops reporting ready.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Consecutive refresh failures before a metric is reported unhealthy
pub const UNHEALTHY_AFTER_FAILURES: u32 = 5;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Last refresh succeeded
    Healthy,
    /// Refreshes are failing but the last value is still served
    Degraded,
    /// Too many consecutive failures
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub consecutive_failures: u32,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            consecutive_failures: 0,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Health after `failures` consecutive failed refreshes
    pub fn failing(failures: u32, message: impl Into<String>) -> Self {
        let status = if failures >= UNHEALTHY_AFTER_FAILURES {
            ComponentStatus::Unhealthy
        } else {
            ComponentStatus::Degraded
        };
        Self {
            status,
            message: Some(message.into()),
            consecutive_failures: failures,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Worst status among the components
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Shared health state, cheap to clone
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component as healthy
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    pub async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    /// Record a successful refresh, clearing the failure streak
    pub async fn record_success(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Record a failed refresh and return the component's new health
    pub async fn record_failure(&self, name: &str, message: impl Into<String>) -> ComponentHealth {
        let mut components = self.components.write().await;
        let failures = components
            .get(name)
            .map(|h| h.consecutive_failures)
            .unwrap_or(0)
            .saturating_add(1);
        let health = ComponentHealth::failing(failures, message);
        components.insert(name.to_string(), health.clone());
        health
    }

    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Agent not yet initialized".to_string()),
            }
        } else if health.status == ComponentStatus::Unhealthy {
            let failing: Vec<&str> = health
                .components
                .iter()
                .filter(|(_, h)| h.status == ComponentStatus::Unhealthy)
                .map(|(name, _)| name.as_str())
                .collect();
            ReadinessResponse {
                ready: false,
                reason: Some(format!("Metrics unhealthy: {}", failing.join(", "))),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_registry_initial_state() {
        let registry = HealthRegistry::new();
        let health = registry.health().await;

        assert_eq!(health.status, ComponentStatus::Healthy);
        assert!(health.components.is_empty());
    }

    #[tokio::test]
    async fn test_single_failure_degrades() {
        let registry = HealthRegistry::new();
        registry.register("cpu").await;
        registry.register("memory").await;

        let cpu = registry.record_failure("cpu", "failed to read /proc/stat").await;
        assert_eq!(cpu.status, ComponentStatus::Degraded);

        let health = registry.health().await;
        assert_eq!(health.status, ComponentStatus::Degraded);
        assert_eq!(health.components["cpu"].consecutive_failures, 1);
        assert_eq!(
            health.components["cpu"].message.as_deref(),
            Some("failed to read /proc/stat")
        );
    }

    #[tokio::test]
    async fn test_repeated_failures_become_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register("disk").await;

        let mut status = ComponentStatus::Healthy;
        for _ in 0..UNHEALTHY_AFTER_FAILURES {
            status = registry.record_failure("disk", "no such device").await.status;
        }
        assert_eq!(status, ComponentStatus::Unhealthy);
        assert!(!status.is_operational());
    }

    #[tokio::test]
    async fn test_success_resets_failure_streak() {
        let registry = HealthRegistry::new();
        registry.register("swap").await;

        for _ in 0..UNHEALTHY_AFTER_FAILURES - 1 {
            registry.record_failure("swap", "boom").await;
        }
        registry.record_success("swap").await;
        let swap = registry.record_failure("swap", "boom").await;

        assert_eq!(swap.status, ComponentStatus::Degraded);
        assert_eq!(registry.health().await.components["swap"].consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_readiness_not_ready_initially() {
        let registry = HealthRegistry::new();
        let readiness = registry.readiness().await;

        assert!(!readiness.ready);
        assert!(readiness.reason.is_some());
    }

    #[tokio::test]
    async fn test_readiness_survives_degraded_metric() {
        let registry = HealthRegistry::new();
        registry.register("cpu").await;
        registry.set_ready(true).await;
        registry.record_failure("cpu", "transient").await;

        assert!(registry.readiness().await.ready);
    }

    #[tokio::test]
    async fn test_readiness_lost_when_unhealthy() {
        let registry = HealthRegistry::new();
        registry.register("cpu").await;
        registry.set_ready(true).await;
        registry
            .update("cpu", ComponentHealth::failing(UNHEALTHY_AFTER_FAILURES, "gone"))
            .await;

        let readiness = registry.readiness().await;
        assert!(!readiness.ready);
        assert_eq!(readiness.reason.as_deref(), Some("Metrics unhealthy: cpu"));
    }
}
