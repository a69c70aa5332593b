//! Readiness agent core
//!
//! - `state` - provider handles shared by every component
//! - `listener` - metric discovery, starts the poller
//! - `poller` - keeps sentinel files in line with broker and session state
//! - `sentinel` - filesystem sentinels read by the process supervisor

pub mod listener;
pub mod poller;
pub mod sentinel;
pub mod state;

pub use listener::DiscoveryListener;
pub use poller::{PollOutcome, Poller, PollerLauncher, POLL_INTERVAL};
pub use sentinel::{SentinelError, SentinelFiles};
pub use state::{
    broker_code, code_of, is_running, AgentState, StateSnapshot, BROKER_RECOVERY_STATE,
    BROKER_RUNNING_STATE, BROKER_UNKNOWN_STATE,
};
