use anyhow::Context as _;
use broker_agent::agent::{AgentState, DiscoveryListener, PollOutcome, PollerLauncher};
use broker_agent::config::{self, AgentSettings, ARGS_ENV};
use broker_agent::metrics::scrape::SnapshotScraper;
use broker_agent::metrics::{MetricsRegistry, MetricsSource};
use broker_agent::server::tls::load_server_config;
use broker_agent::server::{
    bind_status_listener, serve_status, ShutdownSignal, GRACEFUL_SHUTDOWN_TIMEOUT,
};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

/// Validate arguments, start every component and run until shutdown
///
/// Any error returned here happens before the agent starts serving and
/// is fatal to the process.
async fn run(raw_args: &str, settings: AgentSettings) -> anyhow::Result<()> {
    let (args, sentinels) = config::prepare_startup(raw_args)?;
    info!(
        broker_ready_file = %args.broker_ready_file.display(),
        session_connected_file = %args.session_connected_file.display(),
        keystore = %args.keystore_path,
        truststore = %args.truststore_path,
        "Starting broker agent"
    );

    let tls = load_server_config(
        Path::new(&args.keystore_path),
        args.keystore_password(),
        Path::new(&args.truststore_path),
    )
    .context("Could not load TLS credentials for the broker state server")?;

    let shutdown = ShutdownSignal::new();
    let state = AgentState::new();

    // The status server comes up before discovery so a bind failure stops
    // startup before any sentinel can be written.
    let listener = bind_status_listener(settings.https_port).await?;
    let server = tokio::spawn(serve_status(
        listener,
        tls,
        state.clone(),
        shutdown.clone(),
        GRACEFUL_SHUTDOWN_TIMEOUT,
    ));

    info!("Starting metrics registry");
    let registry = Arc::new(MetricsRegistry::new());
    let launcher = Arc::new(PollerLauncher::new(
        Handle::current(),
        sentinels.clone(),
        shutdown.clone(),
    ));
    registry.add_listener(Arc::new(DiscoveryListener::new(state, launcher.clone())));

    let scraper = SnapshotScraper::new(settings.metrics_url, registry);
    let scraper = tokio::spawn(scraper.run(settings.scrape_interval, shutdown.clone()));

    shutdown_requested().await;
    info!("Shutdown requested");
    shutdown.trigger();

    if let Some(poller) = launcher.take_handle() {
        match poller.await {
            Ok(PollOutcome::Ready) => info!("Poller finished, broker was ready"),
            Ok(PollOutcome::NotReady) => info!("Poller stopped before broker was ready"),
            Err(e) => error!(error = %e, "Poller task failed"),
        }
    }
    if let Err(e) = scraper.await {
        error!(error = %e, "Metrics scraper task failed");
    }
    if let Err(e) = server.await {
        error!(error = %e, "Status server task failed");
    }

    sentinels.cleanup_on_exit();
    info!("Broker agent stopped");
    Ok(())
}

/// Resolves on SIGINT, or SIGTERM on unix
async fn shutdown_requested() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Could not listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Could not listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let env_args = std::env::var(ARGS_ENV).ok();
    let raw_args = match config::raw_agent_args(std::env::args().skip(1), env_args) {
        Ok(raw) => raw,
        Err(e) => {
            error!(error = %e, "Failed to read agent arguments");
            return Err(e.into());
        }
    };

    if let Err(e) = run(&raw_args, AgentSettings::from_env()).await {
        error!(error = %format!("{:#}", e), "Broker agent failed");
        return Err(e);
    }
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;
