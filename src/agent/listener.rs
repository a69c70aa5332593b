//! Metric discovery listener
//!
//! Feeds newly published broker metrics into [`AgentState`] and starts
//! the poller once both the broker-state and session-state metrics are
//! known.

use super::poller::PollerLauncher;
use super::state::AgentState;
use crate::metrics::{classify, MetricIdentity, MetricsListener, SharedGauge};
use std::sync::Arc;
use tracing::debug;

pub struct DiscoveryListener {
    state: AgentState,
    launcher: Arc<PollerLauncher>,
}

impl DiscoveryListener {
    pub fn new(state: AgentState, launcher: Arc<PollerLauncher>) -> Self {
        Self { state, launcher }
    }
}

impl MetricsListener for DiscoveryListener {
    fn on_metric_added(&self, identity: &MetricIdentity, gauge: SharedGauge) {
        let kind = classify(identity);
        debug!(metric = %identity, kind = ?kind, "Metric added");

        if self.state.record_discovery(kind, gauge) {
            self.launcher.launch(self.state.clone());
        }
    }

    // Providers already recorded stay in place for the life of the process.
    fn on_metric_removed(&self, identity: &MetricIdentity) {
        debug!(metric = %identity, "Metric removed, keeping recorded provider");
    }
}

#[cfg(test)]
#[path = "listener_test.rs"]
mod tests;
