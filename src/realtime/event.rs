//! Realtime protocol events.
//!
//! Every frame is a flat JSON object tagged by a `type` string. Events are
//! kept as loose `serde_json` maps; the console only interprets a handful of
//! types and forwards everything else untouched.

use base64::Engine;
use serde_json::{Map, Value};

use super::error::{ClientError, ClientResult};

/// A protocol event: a JSON object carrying a `type` field.
pub type Event = Map<String, Value>;

/// Event types the console produces or interprets.
pub mod types {
    pub const SESSION_UPDATE: &str = "session.update";
    pub const CONVERSATION_ITEM_CREATE: &str = "conversation.item.create";
    pub const RESPONSE_CREATE: &str = "response.create";
    pub const INPUT_AUDIO_APPEND: &str = "input_audio_buffer.append";
    pub const INPUT_AUDIO_COMMIT: &str = "input_audio_buffer.commit";

    /// Prefix shared by all server audio events
    pub const RESPONSE_AUDIO_PREFIX: &str = "response.audio";
    pub const RESPONSE_AUDIO_DELTA: &str = "response.audio.delta";
    pub const RESPONSE_AUDIO_TRANSCRIPT_DELTA: &str = "response.audio_transcript.delta";
}

/// Build an outbound event from a type name and optional payload
///
/// `data` must be a JSON object. The `type` key is always `event_name`, even
/// when `data` carries its own `type`.
pub fn build_event(event_name: &str, data: Option<Value>) -> ClientResult<Event> {
    let data = match data {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(ClientError::InvalidPayload(format!(
                "data must be a JSON object, got {}",
                kind_of(&other)
            )))
        }
    };

    let mut event = Map::with_capacity(data.len() + 1);
    event.insert("type".to_string(), Value::String(event_name.to_string()));
    for (key, value) in data {
        if key != "type" {
            event.insert(key, value);
        }
    }

    Ok(event)
}

/// The `type` field of an event, if it is a string
pub fn event_type(event: &Event) -> Option<&str> {
    event.get("type").and_then(Value::as_str)
}

/// The `type` field of a serialized event, `None` if the text is not an event
pub fn event_type_of(json: &str) -> Option<String> {
    serde_json::from_str::<Event>(json)
        .ok()
        .and_then(|event| event_type(&event).map(str::to_string))
}

/// Decode a base64 PCM16 little-endian payload into samples
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16(b64: &str) -> Result<Vec<i16>, base64::DecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD.decode(b64)?;

    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| i16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
