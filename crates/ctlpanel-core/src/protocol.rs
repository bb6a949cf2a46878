//! Wire protocol.
//!
//! Two message kinds share one WebSocket connection:
//!
//! - **Text** carries JSON. Requests are `{"command": <int>, "data": <any>}`,
//!   replies are `{"command": <int>, "result": <any>}`. Anything that is not
//!   an object with an integer `command` is answered with the sentinel
//!   `{"command": -1, "result": null}`.
//! - **Binary** carries raw little-endian `i16` PCM, mono, 44.1 kHz. The
//!   server answers with the literal text [`SOUND_RECEIVED`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::commands::CommandError;

/// Command id used by the sentinel reply.
pub const SENTINEL_COMMAND: i64 = -1;

/// Acknowledgement sent for every binary audio frame.
pub const SOUND_RECEIVED: &str = "Sound received";

/// Sample rate of inbound PCM clips.
pub const SAMPLE_RATE_HZ: u32 = 44_100;

/// Channel count of inbound PCM clips.
pub const CHANNELS: u16 = 1;

/// Error code for a command id the table does not know.
pub const UNKNOWN_COMMAND: &str = "UNKNOWN_COMMAND";

/// Error code for a handler that rejected its `data`.
pub const INVALID_DATA: &str = "INVALID_DATA";

/// A classified inbound text message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A tagged command request. `data` is `null` when the key is absent.
    Command {
        /// Requested command id (may be outside the table's domain).
        id: i64,
        /// Payload handed to the handler.
        data: Value,
    },
    /// Unparseable JSON, a non-object, or an object without an integer
    /// `command` key.
    Untagged,
}

impl Inbound {
    /// Classify a text frame.
    pub fn parse(text: &str) -> Self {
        let Ok(Value::Object(mut fields)) = serde_json::from_str::<Value>(text) else {
            return Self::Untagged;
        };
        let Some(id) = fields.get("command").and_then(Value::as_i64) else {
            return Self::Untagged;
        };
        let data = fields.remove("data").unwrap_or(Value::Null);
        Self::Command { id, data }
    }
}

/// Outbound command request, as written by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command id.
    pub command: i64,
    /// Command payload.
    #[serde(default)]
    pub data: Value,
}

/// Error details attached to a failed command reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code ([`UNKNOWN_COMMAND`] or [`INVALID_DATA`]).
    pub code: String,
    /// Human-readable message.
    pub message: String,
}

/// Reply to a text message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// Echoed command id, or [`SENTINEL_COMMAND`].
    pub command: i64,
    /// Handler result; `null` for the sentinel and for errors.
    #[serde(default)]
    pub result: Value,
    /// Present only when the command failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl CommandResponse {
    /// Successful reply.
    pub fn success(command: i64, result: Value) -> Self {
        Self {
            command,
            result,
            error: None,
        }
    }

    /// The `{"command": -1, "result": null}` reply used for malformed or
    /// untagged requests and for rejected connections.
    pub fn sentinel() -> Self {
        Self::success(SENTINEL_COMMAND, Value::Null)
    }

    /// Failed reply for `command`.
    pub fn failure(command: i64, error: &CommandError) -> Self {
        Self {
            command,
            result: Value::Null,
            error: Some(ErrorBody {
                code: error.code().to_owned(),
                message: error.to_string(),
            }),
        }
    }

    /// Whether this is the sentinel reply.
    pub fn is_sentinel(&self) -> bool {
        self.command == SENTINEL_COMMAND && self.result.is_null() && self.error.is_none()
    }

    /// Serialize for the wire.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize command response");
            String::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_tagged_command() {
        let inbound = Inbound::parse(r#"{"command": 0, "data": [2, 3]}"#);
        assert_eq!(
            inbound,
            Inbound::Command {
                id: 0,
                data: json!([2, 3])
            }
        );
    }

    #[test]
    fn parse_missing_data_is_null() {
        let inbound = Inbound::parse(r#"{"command": 2}"#);
        assert_eq!(
            inbound,
            Inbound::Command {
                id: 2,
                data: Value::Null
            }
        );
    }

    #[test]
    fn parse_negative_id_is_still_tagged() {
        let inbound = Inbound::parse(r#"{"command": -5, "data": 1}"#);
        assert_matches::assert_matches!(inbound, Inbound::Command { id: -5, .. });
    }

    #[test]
    fn parse_without_command_key() {
        assert_eq!(Inbound::parse(r#"{"data": [1, 2]}"#), Inbound::Untagged);
    }

    #[test]
    fn parse_non_integer_command() {
        assert_eq!(Inbound::parse(r#"{"command": "0"}"#), Inbound::Untagged);
        assert_eq!(Inbound::parse(r#"{"command": 1.5}"#), Inbound::Untagged);
        assert_eq!(Inbound::parse(r#"{"command": null}"#), Inbound::Untagged);
    }

    #[test]
    fn parse_garbage() {
        assert_eq!(Inbound::parse("not json"), Inbound::Untagged);
        assert_eq!(Inbound::parse(""), Inbound::Untagged);
        assert_eq!(Inbound::parse("[0, 1]"), Inbound::Untagged);
        assert_eq!(Inbound::parse("42"), Inbound::Untagged);
    }

    #[test]
    fn sentinel_wire_format() {
        let json: Value = serde_json::from_str(&CommandResponse::sentinel().to_json()).unwrap();
        assert_eq!(json, json!({"command": -1, "result": null}));
    }

    #[test]
    fn success_wire_format_has_no_error_key() {
        let json: Value =
            serde_json::from_str(&CommandResponse::success(0, json!(6)).to_json()).unwrap();
        assert_eq!(json, json!({"command": 0, "result": 6}));
    }

    #[test]
    fn failure_wire_format() {
        let resp = CommandResponse::failure(9, &CommandError::UnknownCommand { id: 9 });
        let json: Value = serde_json::from_str(&resp.to_json()).unwrap();
        assert_eq!(json["command"], 9);
        assert!(json["result"].is_null());
        assert_eq!(json["error"]["code"], UNKNOWN_COMMAND);
        assert!(json["error"]["message"].as_str().unwrap().contains('9'));
    }

    #[test]
    fn is_sentinel() {
        assert!(CommandResponse::sentinel().is_sentinel());
        assert!(!CommandResponse::success(-1, json!(1)).is_sentinel());
        assert!(!CommandResponse::success(0, Value::Null).is_sentinel());
    }

    #[test]
    fn response_deserializes_without_result_key() {
        let resp: CommandResponse = serde_json::from_str(r#"{"command": 3}"#).unwrap();
        assert_eq!(resp.command, 3);
        assert!(resp.result.is_null());
    }
}
