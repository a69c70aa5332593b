//! Shared readiness and session state
//!
//! Written by the discovery listener, read by the poller and the status
//! endpoint. Readers take a [`StateSnapshot`] of the provider handles and
//! read values after the lock is released, so no reader ever waits on a
//! metric read performed by another.

use crate::metrics::{Gauge, MetricKind, MetricValue, SharedGauge};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Broker is recovering logs and segments
pub const BROKER_RECOVERY_STATE: i8 = 2;

/// Lowest code that means the broker is running
pub const BROKER_RUNNING_STATE: i8 = 3;

/// Broker has not reported a state yet
pub const BROKER_UNKNOWN_STATE: i8 = 127;

/// Whether a broker-state code means the broker is serving
///
/// The unknown sentinel is excluded even though it compares above the
/// running threshold.
pub fn is_running(code: i8) -> bool {
    code >= BROKER_RUNNING_STATE && code != BROKER_UNKNOWN_STATE
}

/// Read a broker-state value as an 8-bit code
///
/// Wider values are truncated to their low byte. A non-numeric value reads
/// as [`BROKER_UNKNOWN_STATE`].
pub fn code_of(value: &MetricValue) -> i8 {
    match value.as_i64() {
        Some(v) => v as i8,
        None => BROKER_UNKNOWN_STATE,
    }
}

/// Read a broker-state gauge as an 8-bit code
pub fn broker_code(gauge: &dyn Gauge) -> i8 {
    code_of(&gauge.value())
}

#[derive(Default)]
struct Providers {
    broker_state: Option<SharedGauge>,
    remaining_logs: Option<SharedGauge>,
    remaining_segments: Option<SharedGauge>,
    session_state: Option<SharedGauge>,
    poller_started: bool,
}

/// Point-in-time copy of the provider handles
#[derive(Clone, Default)]
pub struct StateSnapshot {
    pub broker_state: Option<SharedGauge>,
    pub remaining_logs: Option<SharedGauge>,
    pub remaining_segments: Option<SharedGauge>,
    pub session_state: Option<SharedGauge>,
}

impl StateSnapshot {
    /// Current broker-state value as an 8-bit code
    pub fn broker_code(&self) -> Option<i8> {
        self.broker_state
            .as_ref()
            .map(|gauge| broker_code(gauge.as_ref()))
    }

    /// Raw broker-state value as published
    pub fn broker_value(&self) -> Option<MetricValue> {
        self.broker_state.as_ref().map(|gauge| gauge.value())
    }

    pub fn session_value(&self) -> Option<MetricValue> {
        self.session_state.as_ref().map(|gauge| gauge.value())
    }
}

/// Process-wide agent state; clones share the same data
#[derive(Clone, Default)]
pub struct AgentState {
    inner: Arc<Mutex<Providers>>,
}

impl AgentState {
    /// Empty state: no providers, poller not started
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a discovered provider and decide whether to start the poller
    ///
    /// The write and the start decision happen under one lock: `true` is
    /// returned exactly once, by the first call that finds both the broker
    /// and session providers present.
    pub fn record_discovery(&self, kind: Option<MetricKind>, gauge: SharedGauge) -> bool {
        let mut providers = self.lock();
        match kind {
            Some(MetricKind::BrokerState) => providers.broker_state = Some(gauge),
            Some(MetricKind::RemainingLogs) => providers.remaining_logs = Some(gauge),
            Some(MetricKind::RemainingSegments) => providers.remaining_segments = Some(gauge),
            Some(MetricKind::SessionState) => providers.session_state = Some(gauge),
            None => {}
        }

        let should_start = providers.broker_state.is_some()
            && providers.session_state.is_some()
            && !providers.poller_started;
        if should_start {
            providers.poller_started = true;
            debug!("Broker and session metrics present, poller start claimed");
        }
        should_start
    }

    /// Whether the poller start has been claimed
    pub fn poller_started(&self) -> bool {
        self.lock().poller_started
    }

    /// Copy the provider handles under the lock
    pub fn snapshot(&self) -> StateSnapshot {
        let providers = self.lock();
        StateSnapshot {
            broker_state: providers.broker_state.clone(),
            remaining_logs: providers.remaining_logs.clone(),
            remaining_segments: providers.remaining_segments.clone(),
            session_state: providers.session_state.clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Providers> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
