//! JSON envelopes exchanged between workers and the responder.
//!
//! Field names on the wire are fixed by the protocol (`version`, `VIN`,
//! `command`, `seconds`, `nanoseconds`); the Rust field names describe what the
//! values mean on each side of the exchange.

use super::timestamp::Timestamp;
use serde::{Deserialize, Serialize};

/// The only command modeled by the fleet simulator.
pub const OPEN_DOOR: &str = "openDoor";

/// Protocol revision sent when none is configured.
pub const DEFAULT_PROTOCOL_VERSION: &str = "v1.0";

/// `status` value of a successful acknowledgement.
pub const ACK_OK: &str = "ok";

/// `message` value of a successful acknowledgement.
pub const ACK_MESSAGE: &str = "Request received successfully";

/// A command issued by one simulated vehicle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Wire format revision, also used as the first path segment.
    #[serde(rename = "version")]
    pub protocol_version: String,

    /// Stable per-worker identity (an 8-digit VIN).
    #[serde(rename = "VIN")]
    pub identity: String,

    /// Command name, `openDoor` unless configured otherwise.
    pub command: String,

    /// Client-side capture time, seconds component.
    #[serde(rename = "seconds")]
    pub capture_seconds: i64,

    /// Client-side capture time, nanosecond-of-second component.
    #[serde(rename = "nanoseconds")]
    pub capture_nanoseconds: i64,
}

impl CommandEnvelope {
    /// Request path for this envelope: `/{version}/{identity}/{command}`.
    pub fn path(&self) -> String {
        format!("/{}/{}/{}", self.protocol_version, self.identity, self.command)
    }

    pub const fn captured_at(&self) -> Timestamp {
        Timestamp::new(self.capture_seconds, self.capture_nanoseconds)
    }
}

/// Builds the envelope a worker sends on its current tick.
///
/// Pure: the capture time is supplied by the caller, and neither the protocol
/// version nor the command is validated here.
pub fn build(
    identity: &str,
    protocol_version: &str,
    command: &str,
    now: Timestamp,
) -> CommandEnvelope {
    CommandEnvelope {
        protocol_version: protocol_version.to_owned(),
        identity: identity.to_owned(),
        command: command.to_owned(),
        capture_seconds: now.seconds,
        capture_nanoseconds: now.nanoseconds,
    }
}

/// The responder's reply to a [`CommandEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckEnvelope {
    /// `"ok"` on success, anything else is an error indicator.
    pub status: String,

    /// Human-readable message.
    pub message: String,

    /// Server-side receipt time, seconds component.
    #[serde(rename = "seconds")]
    pub receipt_seconds: i64,

    /// Server-side receipt time, nanosecond-of-second component.
    #[serde(rename = "nanoseconds")]
    pub receipt_nanoseconds: i64,
}

impl AckEnvelope {
    /// A successful acknowledgement stamped with the receipt time.
    pub fn ok(received_at: Timestamp) -> Self {
        Self {
            status: ACK_OK.to_owned(),
            message: ACK_MESSAGE.to_owned(),
            receipt_seconds: received_at.seconds,
            receipt_nanoseconds: received_at.nanoseconds,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ACK_OK
    }

    pub const fn received_at(&self) -> Timestamp {
        Timestamp::new(self.receipt_seconds, self.receipt_nanoseconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_uses_wire_field_names() {
        let envelope = build("12345678", "v1.0", OPEN_DOOR, Timestamp::new(10, 500));
        let json = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "version": "v1.0",
                "VIN": "12345678",
                "command": "openDoor",
                "seconds": 10,
                "nanoseconds": 500,
            })
        );
    }

    #[test]
    fn command_survives_a_trip_through_json() {
        let sent = build("87654321", "v2", OPEN_DOOR, Timestamp::new(59, 999_999_999));
        let bytes = serde_json::to_vec(&sent).unwrap();
        let received: CommandEnvelope = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(received.protocol_version, sent.protocol_version);
        assert_eq!(received.identity, sent.identity);
        assert_eq!(received.command, sent.command);
        assert_eq!(received.captured_at(), Timestamp::new(59, 999_999_999));
    }

    #[test]
    fn command_parses_the_documented_sample() {
        let body = r#"{"version":"v1.0","VIN":"12345678","command":"openDoor","seconds":10,"nanoseconds":500}"#;
        let envelope: CommandEnvelope = serde_json::from_str(body).unwrap();

        assert_eq!(envelope.path(), "/v1.0/12345678/openDoor");
        assert_eq!(envelope.capture_seconds, 10);
        assert_eq!(envelope.capture_nanoseconds, 500);
    }

    #[test]
    fn command_rejects_missing_fields() {
        let body = r#"{"version":"v1.0","VIN":"12345678"}"#;
        assert!(serde_json::from_str::<CommandEnvelope>(body).is_err());
    }

    #[test]
    fn command_ignores_unknown_fields() {
        let body = r#"{"version":"v1","VIN":"1","command":"x","seconds":0,"nanoseconds":0,"extra":true}"#;
        assert!(serde_json::from_str::<CommandEnvelope>(body).is_ok());
    }

    #[test]
    fn ack_ok_carries_fixed_status_and_message() {
        let ack = AckEnvelope::ok(Timestamp::new(1_700_000_000, 42));
        let json = serde_json::to_string(&ack).unwrap();

        assert!(ack.is_ok());
        assert_eq!(
            json,
            r#"{"status":"ok","message":"Request received successfully","seconds":1700000000,"nanoseconds":42}"#
        );
    }

    #[test]
    fn ack_with_other_status_is_not_ok() {
        let ack: AckEnvelope =
            serde_json::from_str(r#"{"status":"error","message":"nope","seconds":0,"nanoseconds":0}"#)
                .unwrap();
        assert!(!ack.is_ok());
    }
}
