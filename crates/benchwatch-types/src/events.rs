// ABOUTME: Notification event kinds and the WebSocket message envelope
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Every message kind carried by the notification hub and WebSocket surface.
///
/// The first four are domain events; the rest are control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    NewRun,
    RegressionDetected,
    BaselineUpdated,
    AnalysisComplete,
    Ping,
    Pong,
    Connection,
    Disconnection,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::NewRun => "new_run",
            EventKind::RegressionDetected => "regression_detected",
            EventKind::BaselineUpdated => "baseline_updated",
            EventKind::AnalysisComplete => "analysis_complete",
            EventKind::Ping => "ping",
            EventKind::Pong => "pong",
            EventKind::Connection => "connection",
            EventKind::Disconnection => "disconnection",
            EventKind::Error => "error",
        }
    }

    /// Domain events fan out to subscribers; control messages do not.
    pub fn is_domain_event(&self) -> bool {
        matches!(
            self,
            EventKind::NewRun
                | EventKind::RegressionDetected
                | EventKind::BaselineUpdated
                | EventKind::AnalysisComplete
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A domain event published through the notification hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// Run this event belongs to; per-run events are delivered in
    /// publication order to each subscriber
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Event {
    pub fn new(kind: EventKind, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
            run_id: None,
        }
    }

    pub fn for_run(kind: EventKind, run_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            kind,
            data,
            timestamp: Utc::now(),
            run_id: Some(run_id.into()),
        }
    }
}

/// Wire envelope for WebSocket traffic in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsEnvelope {
    #[serde(rename = "type")]
    pub kind: EventKind,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub data: serde_json::Value,

    pub timestamp: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WsEnvelope {
    pub fn from_event(event: &Event) -> Self {
        Self {
            kind: event.kind,
            data: event.data.clone(),
            timestamp: event.timestamp,
            id: event.run_id.clone(),
            client_id: None,
            error: None,
        }
    }

    pub fn control(kind: EventKind) -> Self {
        Self {
            kind,
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
            id: None,
            client_id: None,
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            data: serde_json::Value::Null,
            timestamp: Utc::now(),
            id: None,
            client_id: None,
            error: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventKind::RegressionDetected).unwrap(),
            "\"regression_detected\""
        );
        assert_eq!(
            serde_json::from_str::<EventKind>("\"baseline_updated\"").unwrap(),
            EventKind::BaselineUpdated
        );
    }

    #[test]
    fn test_domain_event_classification() {
        assert!(EventKind::NewRun.is_domain_event());
        assert!(EventKind::AnalysisComplete.is_domain_event());
        assert!(!EventKind::Ping.is_domain_event());
        assert!(!EventKind::Error.is_domain_event());
    }

    #[test]
    fn test_envelope_round_trip() {
        let envelope = WsEnvelope::from_event(&Event::for_run(
            EventKind::NewRun,
            "20250701-120000-abc1234",
            serde_json::json!({"test_name": "suite"}),
        ));
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"type\":\"new_run\""));

        let back: WsEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, EventKind::NewRun);
        assert_eq!(back.id.as_deref(), Some("20250701-120000-abc1234"));
    }

    #[test]
    fn test_error_envelope_carries_message() {
        let envelope = WsEnvelope::error("subscriber limit reached");
        assert_eq!(envelope.kind, EventKind::Error);
        assert_eq!(envelope.error.as_deref(), Some("subscriber limit reached"));
    }
}
