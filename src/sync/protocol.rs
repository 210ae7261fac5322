//! Wire protocol for the aggregation server link
//!
//! Newline-delimited JSON messages of the shape
//! `{"event": "<name>", "data": <payload>}` in both directions. Outbound
//! events are `eventmetadata`, `eventdata`, and `attendancedata`; inbound
//! events are `connected` (carrying the assigned client id), `disconnect`,
//! and `requestattendancedata`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One framed message, either direction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl WireMessage {
    pub fn new(event: &str, data: Value) -> Self {
        Self {
            event: event.to_string(),
            data,
        }
    }

    /// Encode as a single line (no trailing newline).
    pub fn encode(&self) -> String {
        // WireMessage has no non-serializable content; encoding cannot fail
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }

    pub fn decode(line: &str) -> Option<Self> {
        serde_json::from_str(line).ok()
    }
}

/// Parsed inbound server events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Logical-connection acknowledgment with the assigned client id
    Connected { client_id: String },
    /// Server-initiated disconnect
    Disconnect,
    /// Server asks for the full attendance dataset
    RequestAttendanceData,
    /// Anything else; ignored
    Unknown(String),
}

impl From<&WireMessage> for ServerEvent {
    fn from(msg: &WireMessage) -> Self {
        match msg.event.as_str() {
            "connected" => {
                let client_id = msg
                    .data
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                ServerEvent::Connected { client_id }
            }
            "disconnect" => ServerEvent::Disconnect,
            "requestattendancedata" => ServerEvent::RequestAttendanceData,
            other => ServerEvent::Unknown(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_one_line() {
        let msg = WireMessage::new("eventmetadata", json!({"eventId": "3_10_2016"}));
        let line = msg.encode();
        assert!(!line.contains('\n'));

        let decoded = WireMessage::decode(&line).unwrap();
        assert_eq!(decoded.event, "eventmetadata");
        assert_eq!(decoded.data["eventId"], "3_10_2016");
    }

    #[test]
    fn parses_inbound_events() {
        let msg = WireMessage::new("connected", json!({"id": "client-7"}));
        assert_eq!(
            ServerEvent::from(&msg),
            ServerEvent::Connected {
                client_id: "client-7".to_string()
            }
        );

        let msg = WireMessage::new("requestattendancedata", Value::Null);
        assert_eq!(ServerEvent::from(&msg), ServerEvent::RequestAttendanceData);

        let msg = WireMessage::new("mystery", Value::Null);
        assert_eq!(
            ServerEvent::from(&msg),
            ServerEvent::Unknown("mystery".to_string())
        );
    }
}
