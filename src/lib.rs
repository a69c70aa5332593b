//! Readiness agent for a storage broker
//!
//! Watches the broker's published metrics, reflects broker readiness and
//! session connectivity as sentinel files for the process supervisor, and
//! serves the broker state over mutually authenticated HTTPS.

pub mod agent;
pub mod config;
pub mod metrics;
pub mod server;
