//! Broker state endpoint
//!
//! `GET /v1/broker-state` reflects the broker-state metric, e.g.
//! `{"brokerState":3}`. While the broker is recovering and the recovery
//! metrics are known the response also carries their values:
//!
//! ```json
//! {"brokerState":2,"recoveryState":{"remainingLogsToRecover":123,"remainingSegmentsToRecover":456}}
//! ```
//!
//! `brokerState` is the value as published; only the recovery check reads
//! it as an 8-bit code.

use crate::agent::{code_of, AgentState, StateSnapshot, BROKER_RECOVERY_STATE};
use crate::metrics::MetricValue;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tracing::error;

pub const BROKER_STATE_PATH: &str = "/v1/broker-state";

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const NOT_FOUND_MESSAGE: &str = "Broker state metric not found";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerStateDocument {
    pub broker_state: MetricValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recovery_state: Option<RecoveryState>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryState {
    pub remaining_logs_to_recover: MetricValue,
    pub remaining_segments_to_recover: MetricValue,
}

/// Build the response document from current provider values
///
/// `None` while the broker-state metric has not been discovered.
pub fn broker_state_document(snapshot: &StateSnapshot) -> Option<BrokerStateDocument> {
    let broker_state = snapshot.broker_value()?;
    let recovering = code_of(&broker_state) == BROKER_RECOVERY_STATE;

    let recovery_state = match (&snapshot.remaining_logs, &snapshot.remaining_segments) {
        (Some(logs), Some(segments)) if recovering => {
            Some(RecoveryState {
                remaining_logs_to_recover: logs.value(),
                remaining_segments_to_recover: segments.value(),
            })
        }
        _ => None,
    };

    Some(BrokerStateDocument {
        broker_state,
        recovery_state,
    })
}

async fn broker_state(State(state): State<AgentState>) -> Response {
    let Some(document) = broker_state_document(&state.snapshot()) else {
        return (
            StatusCode::NOT_FOUND,
            [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
            NOT_FOUND_MESSAGE,
        )
            .into_response();
    };

    match serde_json::to_string(&document) {
        Ok(json) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
            json,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to serialize broker state");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Router serving the broker state endpoint
pub fn status_router(state: AgentState) -> Router {
    Router::new()
        .route(BROKER_STATE_PATH, get(broker_state))
        .with_state(state)
}
