//! Catalog of the broker metrics the agent reacts to

use super::identity::MetricIdentity;

pub const BROKER_STATE: (&str, &str, &str) = ("kafka.server", "KafkaServer", "BrokerState");
pub const REMAINING_LOGS_TO_RECOVER: (&str, &str, &str) =
    ("kafka.log", "LogManager", "remainingLogsToRecover");
pub const REMAINING_SEGMENTS_TO_RECOVER: (&str, &str, &str) =
    ("kafka.log", "LogManager", "remainingSegmentsToRecover");
pub const SESSION_STATE: (&str, &str, &str) =
    ("kafka.server", "SessionExpireListener", "SessionState");

/// Which well-known metric an identity refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    BrokerState,
    RemainingLogs,
    RemainingSegments,
    SessionState,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::BrokerState,
        MetricKind::RemainingLogs,
        MetricKind::RemainingSegments,
        MetricKind::SessionState,
    ];

    fn triple(self) -> (&'static str, &'static str, &'static str) {
        match self {
            MetricKind::BrokerState => BROKER_STATE,
            MetricKind::RemainingLogs => REMAINING_LOGS_TO_RECOVER,
            MetricKind::RemainingSegments => REMAINING_SEGMENTS_TO_RECOVER,
            MetricKind::SessionState => SESSION_STATE,
        }
    }

    /// The published identity of this metric
    pub fn identity(self) -> MetricIdentity {
        let (group, kind, name) = self.triple();
        MetricIdentity::new(group, kind, name)
    }

    fn matches(self, identity: &MetricIdentity) -> bool {
        let (group, kind, name) = self.triple();
        identity.name() == name && identity.group() == group && identity.kind() == kind
    }
}

/// Classify a metric by exact match of group, type and name
///
/// Anything not in the catalog yields `None` and is ignored by the agent.
pub fn classify(identity: &MetricIdentity) -> Option<MetricKind> {
    MetricKind::ALL.into_iter().find(|kind| kind.matches(identity))
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
