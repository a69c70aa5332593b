//! Background poller that projects agent state onto sentinel files
//!
//! Each cycle evaluates the session state first, then the broker state.
//! The loop ends once the broker reports a running state, or earlier if
//! shutdown is requested while it sleeps.

use super::sentinel::SentinelFiles;
use super::state::{is_running, AgentState, StateSnapshot};
use crate::metrics::{MetricIdentity, MetricKind};
use crate::server::ShutdownSignal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Time between poll cycles
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Diagnostics are logged once every this many cycles
const DIAGNOSTIC_EVERY: u64 = 60;

/// Session-state value that means the broker is connected
const SESSION_CONNECTED: &str = "CONNECTED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Broker not running yet, keep polling
    NotReady,
    /// Broker running, ready sentinel written
    Ready,
}

/// Projects broker and session state onto the sentinel files
pub struct Poller {
    state: AgentState,
    sentinels: SentinelFiles,
    interval: Duration,
    iteration: u64,
    broker_metric: MetricIdentity,
    session_metric: MetricIdentity,
}

impl Poller {
    /// Poller with the default one-second interval
    pub fn new(state: AgentState, sentinels: SentinelFiles) -> Self {
        Self {
            state,
            sentinels,
            interval: POLL_INTERVAL,
            iteration: 0,
            broker_metric: MetricKind::BrokerState.identity(),
            session_metric: MetricKind::SessionState.identity(),
        }
    }

    /// Override the sleep between cycles
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Number of completed poll cycles
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Run one cycle: session first, then broker
    pub fn poll_once(&mut self) -> PollOutcome {
        let snapshot = self.state.snapshot();
        let diagnostic = self.iteration % DIAGNOSTIC_EVERY == 0;
        self.iteration += 1;

        self.handle_session_state(&snapshot, diagnostic);
        self.handle_broker_state(&snapshot, diagnostic)
    }

    fn handle_session_state(&self, snapshot: &StateSnapshot, diagnostic: bool) {
        trace!(metric = %self.session_metric, "Polling");
        let Some(value) = snapshot.session_value() else {
            return;
        };

        if value.to_string() == SESSION_CONNECTED {
            if let Err(e) = self.sentinels.mark_session_connected() {
                error!(error = %e, "Could not write session connected file");
            }
        } else {
            if let Err(e) = self.sentinels.clear_session_connected() {
                error!(error = %e, "Could not delete session connected file");
            }
            if diagnostic {
                debug!(metric = %self.session_metric, value = %value, "Session not connected");
            }
        }
    }

    fn handle_broker_state(&self, snapshot: &StateSnapshot, diagnostic: bool) -> PollOutcome {
        trace!(metric = %self.broker_metric, "Polling");
        let Some(code) = snapshot.broker_code() else {
            return PollOutcome::NotReady;
        };

        if is_running(code) {
            trace!(metric = %self.broker_metric, code, "Running as broker => ready");
            if let Err(e) = self.sentinels.mark_broker_ready() {
                error!(error = %e, "Could not write readiness file");
            }
            PollOutcome::Ready
        } else {
            if diagnostic {
                debug!(metric = %self.broker_metric, code, "Broker not running yet");
            }
            PollOutcome::NotReady
        }
    }

    /// Poll until the broker is ready or shutdown is signalled
    pub async fn run(mut self, shutdown: ShutdownSignal) -> PollOutcome {
        loop {
            if self.poll_once() == PollOutcome::Ready {
                debug!(iterations = self.iteration, "Broker ready, poller exiting");
                return PollOutcome::Ready;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = shutdown.wait() => {
                    warn!("Poller interrupted before broker became ready");
                    return PollOutcome::NotReady;
                }
            }
        }
    }
}

/// Starts the poller on the agent's runtime
///
/// Safe to call from threads outside the runtime, such as a metrics
/// discovery callback.
pub struct PollerLauncher {
    runtime: Handle,
    sentinels: SentinelFiles,
    interval: Duration,
    shutdown: ShutdownSignal,
    handle: Mutex<Option<JoinHandle<PollOutcome>>>,
    launches: AtomicUsize,
}

impl PollerLauncher {
    /// Launcher spawning onto `runtime`, stopped by `shutdown`
    pub fn new(runtime: Handle, sentinels: SentinelFiles, shutdown: ShutdownSignal) -> Self {
        Self {
            runtime,
            sentinels,
            interval: POLL_INTERVAL,
            shutdown,
            handle: Mutex::new(None),
            launches: AtomicUsize::new(0),
        }
    }

    /// Interval handed to every poller this launcher starts
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Spawn a poller over `state` and keep its join handle
    pub fn launch(&self, state: AgentState) {
        info!("Starting poller");
        let poller = Poller::new(state, self.sentinels.clone()).with_interval(self.interval);
        let handle = self.runtime.spawn(poller.run(self.shutdown.clone()));

        self.launches.fetch_add(1, Ordering::SeqCst);
        *self.handle.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// How many pollers have been spawned
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Take the running poller's join handle, if it has been launched
    pub fn take_handle(&self) -> Option<JoinHandle<PollOutcome>> {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
#[path = "poller_test.rs"]
mod tests;
