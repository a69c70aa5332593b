//! Broker metric model
//!
//! - `identity` - structured metric names and values
//! - `catalog` - the four metrics the agent cares about
//! - `registry` - discovery notifications for published metrics
//! - `scrape` - mirrors the broker's metrics snapshot into the registry

pub mod catalog;
pub mod identity;
pub mod registry;
pub mod scrape;

pub use catalog::{classify, MetricKind};
pub use identity::{MetricIdentity, MetricValue};
pub use registry::{
    Gauge, MetricsListener, MetricsRegistry, MetricsSource, SharedGauge, ValueGauge,
};
