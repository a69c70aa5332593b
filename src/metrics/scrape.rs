//! Broker metrics snapshot scraper
//!
//! Periodically fetches a line-oriented snapshot of the broker's metrics
//! and mirrors it into the [`MetricsRegistry`]:
//!
//! ```text
//! # comment
//! kafka.server:type=KafkaServer,name=BrokerState 3
//! kafka.server:type=SessionExpireListener,name=SessionState CONNECTED
//! ```

use super::identity::{MetricIdentity, MetricValue};
use super::registry::{MetricsRegistry, ValueGauge};
use crate::server::ShutdownSignal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Default time between snapshot fetches
pub const DEFAULT_SCRAPE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error fetching metrics snapshot: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Metrics endpoint returned status {0}")]
    Status(reqwest::StatusCode),
}

/// Parse a snapshot body into `(identity, value)` samples
///
/// Blank lines and `#` comments are skipped, as are lines that do not
/// parse.
pub fn parse_snapshot(body: &str) -> Vec<(MetricIdentity, MetricValue)> {
    body.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let Some((name, value)) = line.split_once(char::is_whitespace) else {
                debug!(line = %line, "Skipping snapshot line without a value");
                return None;
            };
            match MetricIdentity::parse(name) {
                Ok(identity) => Some((identity, MetricValue::parse(value))),
                Err(e) => {
                    debug!(line = %line, error = %e, "Skipping malformed snapshot line");
                    None
                }
            }
        })
        .collect()
}

/// Mirrors the broker's metrics snapshot into a [`MetricsRegistry`]
pub struct SnapshotScraper {
    client: reqwest::Client,
    url: String,
    registry: Arc<MetricsRegistry>,
    gauges: HashMap<MetricIdentity, Arc<ValueGauge>>,
}

impl SnapshotScraper {
    pub fn new(url: impl Into<String>, registry: Arc<MetricsRegistry>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            registry,
            gauges: HashMap::new(),
        }
    }

    /// Apply parsed samples, registering identities seen for the first time
    ///
    /// Returns how many new metrics were registered.
    pub fn apply(&mut self, samples: Vec<(MetricIdentity, MetricValue)>) -> usize {
        let mut discovered = 0;
        for (identity, value) in samples {
            match self.gauges.get(&identity) {
                Some(gauge) => gauge.set(value),
                None => {
                    let gauge = Arc::new(ValueGauge::new(value));
                    self.gauges.insert(identity.clone(), gauge.clone());
                    self.registry.register(identity, gauge);
                    discovered += 1;
                }
            }
        }
        discovered
    }

    /// Fetch and apply one snapshot
    pub async fn scrape_once(&mut self) -> Result<usize, ScrapeError> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Status(status));
        }

        let body = response.text().await?;
        let samples = parse_snapshot(&body);
        trace!(url = %self.url, samples = samples.len(), "Fetched metrics snapshot");
        Ok(self.apply(samples))
    }

    /// Scrape until shutdown
    ///
    /// Fetch failures are logged and retried on the next tick.
    pub async fn run(mut self, interval: Duration, shutdown: ShutdownSignal) {
        info!(url = %self.url, interval_ms = interval.as_millis() as u64, "Starting metrics scraper");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.scrape_once().await {
                        Ok(0) => {}
                        Ok(discovered) => debug!(discovered, "Discovered new metrics"),
                        Err(e) => warn!(url = %self.url, error = %e, "Metrics snapshot fetch failed"),
                    }
                }
                _ = shutdown.wait() => {
                    info!("Metrics scraper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "scrape_test.rs"]
mod tests;
