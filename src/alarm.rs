//! Alarm notification decoding.
//!
//! Alarm state changes arrive wrapped in a notification envelope:
//!
//! ```text
//! {"Records": [{"Sns": {"Message": "{\"AlarmName\": ..., \"NewStateValue\": ...}"}}]}
//! ```
//!
//! The alarm document is itself a JSON string inside the envelope. Only the
//! first record is consulted; a batch of more than one is logged and the rest
//! are dropped.

use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

use crate::metrics::{self, EventOutcome};

/// New state reported by an alarm transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlarmState {
    /// Metric is within its threshold.
    Ok,
    /// Metric breached its threshold.
    Alarm,
    /// Not enough data to evaluate.
    InsufficientData,
    /// Any value this controller does not know about.
    Other(String),
}

impl From<&str> for AlarmState {
    fn from(value: &str) -> Self {
        match value {
            "OK" => Self::Ok,
            "ALARM" => Self::Alarm,
            "INSUFFICIENT_DATA" => Self::InsufficientData,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AlarmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => f.write_str("OK"),
            Self::Alarm => f.write_str("ALARM"),
            Self::InsufficientData => f.write_str("INSUFFICIENT_DATA"),
            Self::Other(other) => f.write_str(other),
        }
    }
}

/// A decoded alarm transition. Consumed once, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmEvent {
    /// Name of the alarm that changed state.
    pub alarm_name: String,
    /// State the alarm moved into.
    pub new_state: AlarmState,
    /// State the alarm moved out of, when reported.
    pub old_state: Option<AlarmState>,
    /// Human-readable reason for the transition, when reported.
    pub reason: Option<String>,
}

/// Errors decoding a notification envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Envelope is not valid JSON or lacks the expected shape.
    #[error("malformed envelope: {0}")]
    Envelope(#[source] serde_json::Error),

    /// Envelope carried no records.
    #[error("envelope contains no records")]
    NoRecords,

    /// Embedded alarm document is malformed or missing required fields.
    #[error("malformed alarm payload: {0}")]
    Payload(#[source] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Records", default)]
    records: Vec<EnvelopeRecord>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeRecord {
    #[serde(rename = "Sns")]
    sns: Notification,
}

#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AlarmPayload {
    alarm_name: String,
    new_state_value: String,
    #[serde(default)]
    old_state_value: Option<String>,
    #[serde(default)]
    new_state_reason: Option<String>,
}

/// Decode an envelope into the alarm event of its first record.
pub fn parse_envelope(raw: &[u8]) -> Result<AlarmEvent, EnvelopeError> {
    let envelope: Envelope = serde_json::from_slice(raw).map_err(EnvelopeError::Envelope)?;

    let count = envelope.records.len();
    let record = envelope
        .records
        .into_iter()
        .next()
        .ok_or(EnvelopeError::NoRecords)?;
    if count > 1 {
        warn!(
            records = count,
            "envelope carries more than one record; only the first is handled"
        );
    }

    let payload: AlarmPayload =
        serde_json::from_str(&record.sns.message).map_err(EnvelopeError::Payload)?;

    Ok(AlarmEvent {
        alarm_name: payload.alarm_name,
        new_state: AlarmState::from(payload.new_state_value.as_str()),
        old_state: payload
            .old_state_value
            .as_deref()
            .map(AlarmState::from),
        reason: payload.new_state_reason,
    })
}

/// Decode an envelope, logging and swallowing any failure.
///
/// `None` means "no event"; callers stop without side effects.
pub fn interpret(raw: &[u8]) -> Option<AlarmEvent> {
    match parse_envelope(raw) {
        Ok(event) => {
            metrics::record_event(EventOutcome::Parsed);
            Some(event)
        }
        Err(e) => {
            error!(error = %e, "failed to parse notification envelope");
            metrics::record_event(EventOutcome::Malformed);
            None
        }
    }
}

/// Whether `alarm_name` belongs to the primary region.
///
/// Matches by substring containment of the label, so a label that is itself
/// contained in the other region's alarm names will match those too.
pub fn is_primary_alarm(alarm_name: &str, primary_label: &str) -> bool {
    alarm_name.contains(primary_label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn envelope_with(messages: &[serde_json::Value]) -> Vec<u8> {
        let records: Vec<_> = messages
            .iter()
            .map(|m| json!({ "Sns": { "Message": m.to_string() } }))
            .collect();
        serde_json::to_vec(&json!({ "Records": records })).unwrap()
    }

    #[test]
    fn test_parse_alarm_transition() {
        let raw = envelope_with(&[json!({
            "AlarmName": "RegionDown-east-example.com",
            "NewStateValue": "ALARM",
            "OldStateValue": "OK",
            "NewStateReason": "Threshold Crossed"
        })]);

        let event = parse_envelope(&raw).unwrap();
        assert_eq!(event.alarm_name, "RegionDown-east-example.com");
        assert_eq!(event.new_state, AlarmState::Alarm);
        assert_eq!(event.old_state, Some(AlarmState::Ok));
        assert_eq!(event.reason.as_deref(), Some("Threshold Crossed"));
    }

    #[test]
    fn test_unknown_state_is_preserved() {
        let raw = envelope_with(&[json!({
            "AlarmName": "RegionDown-east",
            "NewStateValue": "SNOOZED"
        })]);

        let event = parse_envelope(&raw).unwrap();
        assert_eq!(event.new_state, AlarmState::Other("SNOOZED".to_string()));
        assert_eq!(event.new_state.to_string(), "SNOOZED");
        assert!(event.old_state.is_none());
    }

    #[test]
    fn test_insufficient_data_state() {
        assert_eq!(
            AlarmState::from("INSUFFICIENT_DATA"),
            AlarmState::InsufficientData
        );
    }

    #[test]
    fn test_empty_records_is_error() {
        let raw = br#"{"Records": []}"#;
        assert!(matches!(
            parse_envelope(raw),
            Err(EnvelopeError::NoRecords)
        ));
    }

    #[test]
    fn test_missing_records_is_error() {
        let raw = br#"{}"#;
        assert!(matches!(
            parse_envelope(raw),
            Err(EnvelopeError::NoRecords)
        ));
    }

    #[test]
    fn test_not_json_is_error() {
        assert!(matches!(
            parse_envelope(b"not json"),
            Err(EnvelopeError::Envelope(_))
        ));
    }

    #[test]
    fn test_missing_state_field_is_error() {
        let raw = envelope_with(&[json!({ "AlarmName": "RegionDown-east" })]);
        assert!(matches!(
            parse_envelope(&raw),
            Err(EnvelopeError::Payload(_))
        ));
    }

    #[test]
    fn test_message_not_json_is_error() {
        let raw = serde_json::to_vec(&json!({
            "Records": [{ "Sns": { "Message": "plain text" } }]
        }))
        .unwrap();
        assert!(matches!(
            parse_envelope(&raw),
            Err(EnvelopeError::Payload(_))
        ));
    }

    #[test]
    fn test_only_first_record_consulted() {
        let raw = envelope_with(&[
            json!({ "AlarmName": "first", "NewStateValue": "OK" }),
            json!({ "AlarmName": "second", "NewStateValue": "ALARM" }),
        ]);

        let event = parse_envelope(&raw).unwrap();
        assert_eq!(event.alarm_name, "first");
        assert_eq!(event.new_state, AlarmState::Ok);
    }

    #[test]
    fn test_interpret_swallows_errors() {
        assert!(interpret(b"{\"Records\": 7}").is_none());
    }

    #[test]
    fn test_primary_alarm_substring_match() {
        assert!(is_primary_alarm("RegionDown-east-example.com", "east"));
        assert!(!is_primary_alarm("RegionDown-west-example.com", "east"));
        // loose by construction: "east" also matches inside "us-east-2"
        assert!(is_primary_alarm("RegionDown-us-east-2", "east"));
    }
}
