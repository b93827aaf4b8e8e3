/// Wire messages exchanged with the browser client
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::tokenizer::Payload;

/// Inbound control message, tagged by `type`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Keystrokes for the hosted process
    Input { data: String },
    /// New terminal geometry
    Resize { cols: u16, rows: u16 },
}

impl ControlMessage {
    /// Decode one text or binary frame body
    pub fn parse(frame: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(frame)
    }

    /// Messages that carry nothing to act on: empty input, zero-sized resize
    pub fn is_noop(&self) -> bool {
        match self {
            ControlMessage::Input { data } => data.is_empty(),
            ControlMessage::Resize { cols, rows } => *cols == 0 || *rows == 0,
        }
    }
}

/// Text frame announcing one extracted UI payload
#[derive(Debug, Serialize)]
struct PayloadFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    spec: &'a RawValue,
}

/// Frame `type` used for extracted payloads
pub const PAYLOAD_FRAME_TYPE: &str = "json-render";

/// Serialize a payload into its outbound text frame; the payload text is embedded unmodified
pub fn encode_payload(payload: &Payload) -> Result<String, serde_json::Error> {
    serde_json::to_string(&PayloadFrame {
        kind: PAYLOAD_FRAME_TYPE,
        spec: payload.raw(),
    })
}
