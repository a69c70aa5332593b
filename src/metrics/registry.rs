//! In-process metrics registry with discovery notifications
//!
//! The registry is the agent's view of the broker's published metrics.
//! Whoever learns about a metric (the snapshot scraper, or an embedding
//! process) registers a gauge here; listeners are told about each metric
//! the first time it appears.

use super::identity::{MetricIdentity, MetricValue};
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error};

/// Live handle from which a metric's current value is read
pub trait Gauge: Send + Sync {
    fn value(&self) -> MetricValue;
}

pub type SharedGauge = Arc<dyn Gauge>;

/// Callback interface for metric discovery
///
/// Invoked on whichever thread registers the metric.
pub trait MetricsListener: Send + Sync {
    fn on_metric_added(&self, identity: &MetricIdentity, gauge: SharedGauge);

    fn on_metric_removed(&self, _identity: &MetricIdentity) {}
}

/// Anything that can deliver discovery notifications
pub trait MetricsSource {
    fn add_listener(&self, listener: Arc<dyn MetricsListener>);
}

/// Gauge whose value is set by its owner
#[derive(Debug)]
pub struct ValueGauge {
    value: RwLock<MetricValue>,
}

impl ValueGauge {
    pub fn new(value: impl Into<MetricValue>) -> Self {
        Self {
            value: RwLock::new(value.into()),
        }
    }

    pub fn set(&self, value: impl Into<MetricValue>) {
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }
}

impl Gauge for ValueGauge {
    fn value(&self) -> MetricValue {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// In-process metrics source keyed by identity
#[derive(Default)]
pub struct MetricsRegistry {
    metrics: RwLock<HashMap<MetricIdentity, SharedGauge>>,
    listeners: RwLock<Vec<Arc<dyn MetricsListener>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gauge, notifying listeners if the identity is new
    ///
    /// Returns the gauge now held for `identity`, which is the previously
    /// registered one if there was one.
    pub fn register(&self, identity: MetricIdentity, gauge: SharedGauge) -> SharedGauge {
        {
            let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = metrics.get(&identity) {
                return existing.clone();
            }
            metrics.insert(identity.clone(), gauge.clone());
        }

        debug!(metric = %identity, "Registered metric");
        for listener in self.listeners_snapshot() {
            notify_added(listener.as_ref(), &identity, gauge.clone());
        }
        gauge
    }

    pub fn remove(&self, identity: &MetricIdentity) -> Option<SharedGauge> {
        let removed = self
            .metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(identity);

        if removed.is_some() {
            debug!(metric = %identity, "Removed metric");
            for listener in self.listeners_snapshot() {
                listener.on_metric_removed(identity);
            }
        }
        removed
    }

    pub fn get(&self, identity: &MetricIdentity) -> Option<SharedGauge> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn listeners_snapshot(&self) -> Vec<Arc<dyn MetricsListener>> {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl MetricsSource for MetricsRegistry {
    /// Add a listener and replay every metric registered so far to it
    fn add_listener(&self, listener: Arc<dyn MetricsListener>) {
        let existing: Vec<(MetricIdentity, SharedGauge)> = {
            let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
            listeners.push(listener.clone());
            self.metrics
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .iter()
                .map(|(identity, gauge)| (identity.clone(), gauge.clone()))
                .collect()
        };

        for (identity, gauge) in existing {
            notify_added(listener.as_ref(), &identity, gauge);
        }
    }
}

/// A panicking listener must not take down the thread that registered the metric
fn notify_added(listener: &dyn MetricsListener, identity: &MetricIdentity, gauge: SharedGauge) {
    let outcome = catch_unwind(AssertUnwindSafe(|| listener.on_metric_added(identity, gauge)));
    if outcome.is_err() {
        error!(metric = %identity, "Metrics listener panicked while handling added metric");
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
