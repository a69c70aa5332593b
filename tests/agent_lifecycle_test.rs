//! Broker agent lifecycle tests
//!
//! Drives the agent the way a broker would: metrics appear in the
//! registry, the poller projects them onto sentinel files and the status
//! router reports them.
//!
//! Run with: cargo test --test agent_lifecycle_test

#![allow(clippy::expect_used)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use broker_agent::agent::{AgentState, DiscoveryListener, PollOutcome, PollerLauncher};
use broker_agent::metrics::{MetricKind, MetricsRegistry, MetricsSource, ValueGauge};
use broker_agent::server::{status_router, ShutdownSignal, BROKER_STATE_PATH};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::runtime::Handle;
use tower::ServiceExt;

const POLL: Duration = Duration::from_millis(20);

struct Agent {
    dir: TempDir,
    state: AgentState,
    registry: Arc<MetricsRegistry>,
    launcher: Arc<PollerLauncher>,
    shutdown: ShutdownSignal,
}

impl Agent {
    fn start() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let sentinels = broker_agent::agent::SentinelFiles::new(
            dir.path().join("broker-ready"),
            dir.path().join("session-connected"),
        );
        let shutdown = ShutdownSignal::new();
        let state = AgentState::new();
        let registry = Arc::new(MetricsRegistry::new());
        let launcher = Arc::new(
            PollerLauncher::new(Handle::current(), sentinels, shutdown.clone()).with_interval(POLL),
        );
        registry.add_listener(Arc::new(DiscoveryListener::new(
            state.clone(),
            launcher.clone(),
        )));

        Self {
            dir,
            state,
            registry,
            launcher,
            shutdown,
        }
    }

    fn ready_file(&self) -> std::path::PathBuf {
        self.dir.path().join("broker-ready")
    }

    fn session_file(&self) -> std::path::PathBuf {
        self.dir.path().join("session-connected")
    }

    fn publish(&self, kind: MetricKind, gauge: Arc<ValueGauge>) -> Arc<ValueGauge> {
        self.registry.register(kind.identity(), gauge.clone());
        gauge
    }

    async fn status(&self) -> (StatusCode, String) {
        let response = status_router(self.state.clone())
            .oneshot(
                Request::builder()
                    .uri(BROKER_STATE_PATH)
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router is infallible");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, String::from_utf8(body.to_vec()).expect("utf-8"))
    }
}

/// Poll `condition` until it holds or `timeout` passes
async fn eventually(timeout: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

fn exists(path: &Path) -> bool {
    path.exists()
}

#[tokio::test]
async fn test_broker_bootstrap_through_recovery_to_ready() {
    let agent = Agent::start();

    // Nothing discovered yet
    let (status, body) = agent.status().await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "Broker state metric not found");

    // Broker recovering, session not yet published: no poller
    let broker = agent.publish(MetricKind::BrokerState, Arc::new(ValueGauge::new(2)));
    let logs = agent.publish(MetricKind::RemainingLogs, Arc::new(ValueGauge::new(123)));
    let segments = agent.publish(MetricKind::RemainingSegments, Arc::new(ValueGauge::new(456)));
    assert_eq!(agent.launcher.launch_count(), 0);

    let (status, body) = agent.status().await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).expect("json");
    assert_eq!(
        json,
        serde_json::json!({
            "brokerState": 2,
            "recoveryState": {"remainingLogsToRecover": 123, "remainingSegmentsToRecover": 456}
        })
    );

    // Session appears: poller starts and tracks connectivity
    let session = agent.publish(MetricKind::SessionState, Arc::new(ValueGauge::new("CONNECTED")));
    assert_eq!(agent.launcher.launch_count(), 1);
    let session_file = agent.session_file();
    assert!(eventually(Duration::from_secs(2), || exists(&session_file)).await);

    session.set("DISCONNECTED");
    assert!(eventually(Duration::from_secs(2), || !exists(&session_file)).await);
    session.set("CONNECTED");
    assert!(eventually(Duration::from_secs(2), || exists(&session_file)).await);

    // Recovery progresses, then the broker reports unknown, then running
    logs.set(0);
    segments.set(0);
    broker.set(127);
    tokio::time::sleep(POLL * 5).await;
    assert!(!exists(&agent.ready_file()), "unknown state is not ready");

    broker.set(3);
    let handle = agent.launcher.take_handle().expect("poller launched");
    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller exits once broker is running")
        .expect("poller task should not panic");
    assert_eq!(outcome, PollOutcome::Ready);
    assert!(exists(&agent.ready_file()));

    let (status, body) = agent.status().await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"brokerState":3}"#);
}

#[tokio::test]
async fn test_rediscovery_does_not_start_second_poller() {
    let agent = Agent::start();

    agent.publish(MetricKind::BrokerState, Arc::new(ValueGauge::new(1)));
    agent.publish(MetricKind::SessionState, Arc::new(ValueGauge::new("CONNECTED")));

    // Metrics disappear and are published again
    for code in 0..5 {
        agent.registry.remove(&MetricKind::BrokerState.identity());
        agent.registry.remove(&MetricKind::SessionState.identity());
        agent.publish(MetricKind::BrokerState, Arc::new(ValueGauge::new(code)));
        agent.publish(MetricKind::SessionState, Arc::new(ValueGauge::new("CONNECTED")));
    }

    assert_eq!(agent.launcher.launch_count(), 1);
    assert!(agent.state.poller_started());
    assert_eq!(agent.state.snapshot().broker_code(), Some(4));
    agent.shutdown.trigger();
}

#[tokio::test]
async fn test_shutdown_stops_poller_before_ready() {
    let agent = Agent::start();
    agent.publish(MetricKind::BrokerState, Arc::new(ValueGauge::new(1)));
    agent.publish(MetricKind::SessionState, Arc::new(ValueGauge::new("CONNECTING")));

    let handle = agent.launcher.take_handle().expect("poller launched");
    tokio::time::sleep(POLL * 2).await;
    agent.shutdown.trigger();

    let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("poller stops on shutdown")
        .expect("poller task should not panic");
    assert_eq!(outcome, PollOutcome::NotReady);
    assert!(!exists(&agent.ready_file()));
    assert!(!exists(&agent.session_file()));
}
