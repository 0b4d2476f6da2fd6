//! De-Ransom Wire Messages
//!
//! This module implements the message structures exchanged over the push
//! connection. Messages are JSON-formatted text frames tagged by a `type`
//! field.
//!
//! ## Frame Structure
//!
//! Inbound (server → client):
//!
//! ```json
//! { "type": "security_event", "event": { ... }, "timestamp": "..." }
//! { "type": "ping" }
//! { "type": "status_update", "status": "...", "message": "..." }
//! ```
//!
//! Outbound (client → server): `{ "type": "pong" }` in reply to a ping, plus
//! arbitrary caller-supplied messages.
//!
//! Frames with an unrecognized `type` are preserved as
//! [`ServerMessage::Unknown`] so the socket can log and drop them without
//! treating them as errors. Security events are routed, not validated: fields
//! the client does not know about are carried through unchanged in
//! [`SecurityEvent::extra`].

use crate::{Result, SocketError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// A message received from the server, tagged by its `type` field
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// A detection from the file monitor, forwarded to the event handler
    SecurityEvent {
        /// The event payload, passed through to the handler unchanged
        event: SecurityEvent,
        /// Broadcast timestamp attached by the server (ISO-8601)
        timestamp: Option<String>,
    },

    /// Liveness probe; answered with exactly one `pong`
    Ping,

    /// Monitoring state change pushed by the server
    StatusUpdate(StatusUpdate),

    /// A frame with a `type` this client does not recognize
    Unknown {
        /// The unrecognized `type` value, kept for logging
        kind: String,
    },
}

impl ServerMessage {
    /// Parse a text frame into a typed message
    ///
    /// Unrecognized kinds parse successfully into [`ServerMessage::Unknown`];
    /// only frames that are not JSON objects, lack a string `type` field, or
    /// carry a malformed payload for a known kind are errors.
    ///
    /// # Examples
    ///
    /// ```
    /// use deransom_protocol::ServerMessage;
    ///
    /// let message = ServerMessage::from_frame(r#"{"type":"ping"}"#).unwrap();
    /// assert_eq!(message, ServerMessage::Ping);
    /// ```
    pub fn from_frame(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)?;

        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| {
                SocketError::InvalidFrame("frame has no string \"type\" field".to_string())
            })?;

        match kind.as_str() {
            "security_event" => {
                let frame: SecurityEventFrame = serde_json::from_value(value)?;
                Ok(ServerMessage::SecurityEvent {
                    event: frame.event,
                    timestamp: frame.timestamp,
                })
            }
            "ping" => Ok(ServerMessage::Ping),
            "status_update" => {
                // The status fields live at the top level of the frame, next
                // to the tag itself.
                let Value::Object(mut map) = value else {
                    return Err(SocketError::InvalidFrame(
                        "status_update frame is not an object".to_string(),
                    ));
                };
                map.remove("type");
                let update: StatusUpdate = serde_json::from_value(Value::Object(map))?;
                Ok(ServerMessage::StatusUpdate(update))
            }
            _ => Ok(ServerMessage::Unknown { kind }),
        }
    }

    /// Serialize this message back into a text frame
    pub fn to_frame(&self) -> Result<String> {
        let value = match self {
            ServerMessage::SecurityEvent { event, timestamp } => {
                let mut frame = json!({
                    "type": "security_event",
                    "event": event,
                });
                if let Some(ts) = timestamp {
                    frame["timestamp"] = json!(ts);
                }
                frame
            }
            ServerMessage::Ping => json!({ "type": "ping" }),
            ServerMessage::StatusUpdate(update) => {
                let mut map = match serde_json::to_value(update)? {
                    Value::Object(map) => map,
                    other => {
                        return Err(SocketError::InvalidFrame(format!(
                            "status update serialized to non-object: {}",
                            other
                        )))
                    }
                };
                map.insert("type".to_string(), json!("status_update"));
                Value::Object(map)
            }
            ServerMessage::Unknown { kind } => json!({ "type": kind }),
        };

        Ok(value.to_string())
    }
}

/// Intermediate shape of a `security_event` frame
#[derive(Debug, Deserialize)]
struct SecurityEventFrame {
    event: SecurityEvent,
    #[serde(default)]
    timestamp: Option<String>,
}

/// A message sent from the client to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Reply to a server liveness probe
    Pong,
}

impl ClientMessage {
    /// Serialize this message into a text frame
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A single detection reported by the file monitor
///
/// The socket routes these by message kind and otherwise treats them as
/// opaque: the typed fields below are the ones the monitor is known to emit,
/// and anything else arrives in [`extra`](Self::extra) untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityEvent {
    /// Path of the file that triggered the detection
    pub file_path: String,

    /// What happened to the file
    pub event_type: EventKind,

    /// Original path, present for rename events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_path: Option<String>,

    /// Detection time as UNIX seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_time: Option<f64>,

    /// Risk classification assigned by the detector
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<RiskLevel>,

    /// Human-readable reasons the detector flagged this event
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detection_reasons: Vec<String>,

    /// Fields this client does not interpret, carried through unchanged
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SecurityEvent {
    /// Detection time as a UTC timestamp, if the event carries one
    pub fn detected_at(&self) -> Option<DateTime<Utc>> {
        self.detection_time
            .and_then(|secs| DateTime::from_timestamp_millis((secs * 1000.0) as i64))
    }
}

/// Kind of filesystem change behind a security event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A new file appeared
    Created,
    /// An existing file changed
    Modified,
    /// A file was removed
    Deleted,
    /// A file was moved or renamed
    Renamed,
    /// A kind this client does not recognize
    Other,
}

impl EventKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
            EventKind::Renamed => "renamed",
            EventKind::Other => "other",
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "created" => EventKind::Created,
            "modified" => EventKind::Modified,
            "deleted" => EventKind::Deleted,
            "renamed" => EventKind::Renamed,
            _ => EventKind::Other,
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(EventKind::from(s.as_str()))
    }
}

/// Risk classification assigned by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Routine activity
    Low,
    /// Suspicious but not conclusive
    Medium,
    /// Strong ransomware indicators
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        write!(f, "{}", name)
    }
}

/// Monitoring state summary from a `status_update` frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// Short state tag, e.g. `success` or `error`
    pub status: String,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the server produced this update (ISO-8601)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    /// Fields this client does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
