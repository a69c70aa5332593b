//! Agent configuration
//!
//! The agent is started with one colon-separated argument string:
//!
//! ```text
//! <ready-file>:<session-file>:<keystore>:<keystore-password>:<truststore>:<truststore-password>
//! ```
//!
//! Everything else comes from environment variables with defaults.

use crate::agent::{SentinelError, SentinelFiles};
use crate::metrics::scrape::DEFAULT_SCRAPE_INTERVAL;
use crate::server::HTTPS_PORT;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Fallback source of the agent argument string
pub const ARGS_ENV: &str = "BROKER_AGENT_ARGS";
pub const HTTPS_PORT_ENV: &str = "BROKER_AGENT_HTTPS_PORT";
pub const METRICS_URL_ENV: &str = "BROKER_AGENT_METRICS_URL";
pub const SCRAPE_INTERVAL_ENV: &str = "BROKER_AGENT_SCRAPE_INTERVAL_MS";

pub const DEFAULT_METRICS_URL: &str = "http://127.0.0.1:9404/metrics";

const ARG_COUNT: usize = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No agent arguments given (pass them as the first argument or set BROKER_AGENT_ARGS)")]
    MissingArguments,

    #[error("Not enough arguments to parse {0:?}")]
    NotEnoughArguments(String),

    #[error("Sentinel file already exists and could not be deleted: {0}")]
    StaleSentinel(#[from] SentinelError),

    #[error("Keystore or truststore path is empty: keystore={keystore:?} truststore={truststore:?}")]
    EmptyStorePath { keystore: String, truststore: String },

    #[error("Keystore password is empty")]
    EmptyKeystorePassword,

    #[error("Truststore password is empty")]
    EmptyTruststorePassword,
}

/// The six positional agent arguments
#[derive(Clone)]
pub struct AgentArgs {
    pub broker_ready_file: PathBuf,
    pub session_connected_file: PathBuf,
    pub keystore_path: String,
    keystore_password: String,
    pub truststore_path: String,
    truststore_password: String,
}

impl fmt::Debug for AgentArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentArgs")
            .field("broker_ready_file", &self.broker_ready_file)
            .field("session_connected_file", &self.session_connected_file)
            .field("keystore_path", &self.keystore_path)
            .field("keystore_password", &"<redacted>")
            .field("truststore_path", &self.truststore_path)
            .field("truststore_password", &"<redacted>")
            .finish()
    }
}

impl AgentArgs {
    /// Split the argument string; fields past the sixth are ignored
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let fields: Vec<&str> = raw.split(':').collect();
        if fields.len() < ARG_COUNT {
            return Err(ConfigError::NotEnoughArguments(raw.to_string()));
        }

        Ok(Self {
            broker_ready_file: PathBuf::from(fields[0]),
            session_connected_file: PathBuf::from(fields[1]),
            keystore_path: fields[2].to_string(),
            keystore_password: fields[3].to_string(),
            truststore_path: fields[4].to_string(),
            truststore_password: fields[5].to_string(),
        })
    }

    /// Sentinel files named by the first two fields
    pub fn sentinels(&self) -> SentinelFiles {
        SentinelFiles::new(
            self.broker_ready_file.clone(),
            self.session_connected_file.clone(),
        )
    }

    /// Secret that unlocks an encrypted keystore key
    pub fn keystore_password(&self) -> &str {
        &self.keystore_password
    }

    /// Reject empty store paths, then empty passwords
    pub fn validate_credentials(&self) -> Result<(), ConfigError> {
        if self.keystore_path.is_empty() || self.truststore_path.is_empty() {
            return Err(ConfigError::EmptyStorePath {
                keystore: self.keystore_path.clone(),
                truststore: self.truststore_path.clone(),
            });
        }
        if self.keystore_password.is_empty() {
            return Err(ConfigError::EmptyKeystorePassword);
        }
        if self.truststore_password.is_empty() {
            return Err(ConfigError::EmptyTruststorePassword);
        }
        Ok(())
    }
}

/// Parse and validate the argument string, clearing stale sentinels
///
/// Checks run in order: field count, stale sentinel removal, store paths,
/// keystore password, truststore password. Nothing on disk is touched if
/// the field count is wrong.
pub fn prepare_startup(raw: &str) -> Result<(AgentArgs, SentinelFiles), ConfigError> {
    let args = AgentArgs::parse(raw)?;
    let sentinels = args.sentinels();
    sentinels.clear_stale()?;
    args.validate_credentials()?;
    Ok((args, sentinels))
}

/// Pick the argument string from the command line, else from the environment
pub fn raw_agent_args(
    mut cli: impl Iterator<Item = String>,
    env: Option<String>,
) -> Result<String, ConfigError> {
    cli.next().or(env).ok_or(ConfigError::MissingArguments)
}

/// Settings with defaults, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    pub https_port: u16,
    pub metrics_url: String,
    pub scrape_interval: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            https_port: HTTPS_PORT,
            metrics_url: DEFAULT_METRICS_URL.to_string(),
            scrape_interval: DEFAULT_SCRAPE_INTERVAL,
        }
    }
}

impl AgentSettings {
    /// Create settings from environment variables
    ///
    /// Uses:
    /// - `BROKER_AGENT_HTTPS_PORT` (default 8443)
    /// - `BROKER_AGENT_METRICS_URL` (default `http://127.0.0.1:9404/metrics`)
    /// - `BROKER_AGENT_SCRAPE_INTERVAL_MS` (default 1000)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let https_port = parse_or(&lookup, HTTPS_PORT_ENV, defaults.https_port);
        let metrics_url = lookup(METRICS_URL_ENV)
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.metrics_url);
        let scrape_interval = parse_or(
            &lookup,
            SCRAPE_INTERVAL_ENV,
            defaults.scrape_interval.as_millis() as u64,
        );

        Self {
            https_port,
            metrics_url,
            scrape_interval: Duration::from_millis(scrape_interval.max(1)),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(variable = key, value = %raw, default = %default, "Invalid setting, using default");
            default
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
