//! Wire packets exchanged with clients.
//!
//! Every frame is a JSON object tagged by `type`:
//!
//! ```text
//! {"type":"event","event":"register","args":[{"name":"Alice"}],"ack":7}
//! {"type":"ack","id":7,"args":[{"ok":true}]}
//! ```
//!
//! `event` packets travel in both directions; `ack` packets only go from the
//! server to the client that supplied the acknowledgement id.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TransportError, TransportResult};

/// A single frame on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Packet {
    /// A named event with positional arguments.
    Event {
        /// Event name; routed by exact match.
        event: String,
        /// Ordered argument payload.
        #[serde(default)]
        args: Vec<Value>,
        /// Acknowledgement id requested by the sender, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ack: Option<u64>,
    },

    /// Reply to an event that carried an acknowledgement id.
    Ack {
        /// The acknowledgement id being answered.
        id: u64,
        /// Reply arguments.
        #[serde(default)]
        args: Vec<Value>,
    },
}

impl Packet {
    /// Creates an outbound event packet without an acknowledgement id.
    pub fn event(event: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event {
            event: event.into(),
            args,
            ack: None,
        }
    }

    /// Creates an acknowledgement packet.
    pub fn ack(id: u64, args: Vec<Value>) -> Self {
        Self::Ack { id, args }
    }

    /// Decodes a packet from a raw frame.
    pub fn decode(data: &[u8]) -> TransportResult<Self> {
        serde_json::from_slice(data).map_err(TransportError::from)
    }

    /// Encodes this packet as a JSON text frame.
    pub fn encode(&self) -> TransportResult<String> {
        serde_json::to_string(self).map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_event_with_ack() {
        let packet =
            Packet::decode(br#"{"type":"event","event":"register","args":["Alice"],"ack":3}"#)
                .unwrap();
        assert_eq!(
            packet,
            Packet::Event {
                event: "register".into(),
                args: vec![json!("Alice")],
                ack: Some(3),
            }
        );
    }

    #[test]
    fn test_decode_event_without_args() {
        let packet = Packet::decode(br#"{"type":"event","event":"ping"}"#).unwrap();
        assert_eq!(packet, Packet::event("ping", vec![]));
    }

    #[test]
    fn test_encode_omits_missing_ack() {
        let text = Packet::event("greet", vec![json!(1)]).encode().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value, json!({"type": "event", "event": "greet", "args": [1]}));
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = Packet::decode(br#"{"type":"nope"}"#).unwrap_err();
        assert!(matches!(err, TransportError::MalformedPacket(_)));
    }
}
