//! HTTPS server for the broker state endpoint
//!
//! - `/v1/broker-state` - current broker state, with recovery progress while
//!   the broker is recovering

mod https;
mod shutdown;
mod status;
pub mod tls;

#[cfg(test)]
mod test_pki;

pub use https::{
    bind_status_listener, serve_status, ServerError, GRACEFUL_SHUTDOWN_TIMEOUT, HTTPS_PORT,
};
pub use shutdown::ShutdownSignal;
pub use status::{
    broker_state_document, status_router, BrokerStateDocument, RecoveryState, BROKER_STATE_PATH,
};

#[cfg(test)]
#[path = "status_test.rs"]
mod tests;
