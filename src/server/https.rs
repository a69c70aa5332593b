//! HTTPS listener for the status endpoint
//!
//! Accepts TLS connections, serves HTTP/1.1 through the status router and
//! drains in-flight requests on shutdown.

use super::shutdown::ShutdownSignal;
use super::status::status_router;
use crate::agent::AgentState;
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use rustls::ServerConfig;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// Default port for the status endpoint
pub const HTTPS_PORT: u16 = 8443;

/// How long in-flight requests may run after shutdown starts
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed accept (e.g. out of file descriptors)
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not bind status server to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

/// Bind the status listener on all interfaces
pub async fn bind_status_listener(port: u16) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    // Log after successful bind - server is actually listening
    info!(port = %port, "Status server listening");
    Ok(listener)
}

/// Serve the status endpoint until shutdown, then drain connections
///
/// In-flight requests get up to `drain_timeout` to finish; anything still
/// open after that is abandoned.
pub async fn serve_status(
    listener: TcpListener,
    tls: Arc<ServerConfig>,
    state: AgentState,
    shutdown: ShutdownSignal,
    drain_timeout: Duration,
) {
    let app = status_router(state);
    let acceptor = TlsAcceptor::from(tls);
    let connections = TaskTracker::new();

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        warn!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        continue;
                    }
                };

                let acceptor = acceptor.clone();
                let service = TowerToHyperService::new(app.clone());
                let conn_shutdown = shutdown.clone();
                connections.spawn(async move {
                    let stream = match acceptor.accept(stream).await {
                        Ok(stream) => stream,
                        Err(e) => {
                            debug!(peer = %peer, error = %e, "TLS handshake failed");
                            return;
                        }
                    };

                    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
                    let mut conn = std::pin::pin!(conn);
                    let mut draining = false;
                    loop {
                        tokio::select! {
                            result = conn.as_mut() => {
                                if let Err(e) = result {
                                    debug!(peer = %peer, error = %e, "Connection closed with error");
                                }
                                break;
                            }
                            _ = conn_shutdown.wait(), if !draining => {
                                draining = true;
                                conn.as_mut().graceful_shutdown();
                            }
                        }
                    }
                });
            }
            _ = shutdown.wait() => break,
        }
    }

    drop(listener);
    info!("Status server stopping, draining in-flight requests");

    connections.close();
    tokio::select! {
        _ = connections.wait() => info!("Status server stopped"),
        _ = tokio::time::sleep(drain_timeout) => {
            warn!(timeout_secs = drain_timeout.as_secs(), "Timed out draining connections, closing");
        }
    }
}

#[cfg(test)]
#[path = "https_test.rs"]
mod tests;
