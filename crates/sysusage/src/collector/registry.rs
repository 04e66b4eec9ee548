//! Registry of running metrics
//!
//! Maps metric names to their [`MetricHandle`] so readers (the HTTP API)
//! can look up the latest readings without touching the collectors.

use super::MetricHandle;
use crate::models::MetricReading;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Concurrent name → handle map
#[derive(Debug, Default)]
pub struct MetricRegistry {
    metrics: DashMap<String, MetricHandle>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self {
            metrics: DashMap::new(),
        }
    }

    /// Register a metric, replacing any handle with the same name
    pub fn register(&self, name: impl Into<String>, handle: MetricHandle) {
        let name = name.into();
        debug!(metric = %name, "Registered metric");
        self.metrics.insert(name, handle);
    }

    pub fn unregister(&self, name: &str) -> Option<MetricHandle> {
        self.metrics.remove(name).map(|(_, handle)| handle)
    }

    pub fn get(&self, name: &str) -> Option<MetricHandle> {
        self.metrics.get(name).map(|entry| entry.value().clone())
    }

    /// Latest reading of `name`
    pub fn reading(&self, name: &str) -> Option<Arc<MetricReading>> {
        self.metrics.get(name).map(|entry| entry.value().read())
    }

    /// Latest readings of every metric, sorted by name
    pub fn list(&self) -> Vec<Arc<MetricReading>> {
        let mut readings: Vec<Arc<MetricReading>> =
            self.metrics.iter().map(|entry| entry.value().read()).collect();
        readings.sort_by(|a, b| a.metric.cmp(&b.metric));
        readings
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(name: &str) -> MetricHandle {
        MetricHandle::new(MetricReading::pending(name))
    }

    #[test]
    fn test_register_and_get() {
        let registry = MetricRegistry::new();
        assert!(registry.is_empty());

        registry.register("cpu", handle("cpu"));
        registry.register("memory", handle("memory"));

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.reading("cpu").unwrap().metric, "cpu");
        assert!(registry.get("swap").is_none());
    }

    #[test]
    fn test_list_is_sorted() {
        let registry = MetricRegistry::new();
        registry.register("swap", handle("swap"));
        registry.register("cpu", handle("cpu"));
        registry.register("memory", handle("memory"));

        let names: Vec<String> = registry.list().iter().map(|r| r.metric.clone()).collect();
        assert_eq!(names, vec!["cpu", "memory", "swap"]);
    }

    #[test]
    fn test_unregister() {
        let registry = MetricRegistry::new();
        registry.register("cpu", handle("cpu"));

        assert!(registry.unregister("cpu").is_some());
        assert!(registry.unregister("cpu").is_none());
        assert!(registry.is_empty());
    }
}
