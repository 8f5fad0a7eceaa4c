use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::models::{Message, Role};

pub const REGISTER: &str = "register";
pub const GROUP_MESSAGE: &str = "groupMessage";
pub const GROUP_USER_TYPING: &str = "groupUserTyping";
pub const GROUP_TYPING: &str = "groupTyping";
pub const CHAT_MESSAGE: &str = "chatMessage";

/// One realtime frame as it travels over the socket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Frame {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self { event: event.into(), data }
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Register {
    pub user_id: String,
    pub role: Role,
}

/// Typing state for one participant; same shape in both directions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Typing {
    pub group_id: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub is_typing: bool,
}

#[derive(Debug, Clone)]
pub enum ServerEvent {
    GroupMessage(Message),
    GroupUserTyping(Typing),
    ChatMessage(Message),
    Unknown(String),
}

impl ServerEvent {
    /// Decode a pushed payload. Payloads missing required fields yield `None`.
    pub fn decode(event: &str, data: &Value) -> Option<Self> {
        let decoded = match event {
            GROUP_MESSAGE => message_payload(data).map(ServerEvent::GroupMessage),
            GROUP_USER_TYPING => Typing::deserialize(data).ok().map(ServerEvent::GroupUserTyping),
            CHAT_MESSAGE => message_payload(data).map(ServerEvent::ChatMessage),
            other => Some(ServerEvent::Unknown(other.to_string())),
        };
        if decoded.is_none() {
            log::debug!("Ignoring malformed {event} payload: {data}");
        }
        decoded
    }
}

// Some pushes wrap the record as `{ "message": {...} }`.
fn message_payload(data: &Value) -> Option<Message> {
    let inner = match data.get("message") {
        Some(v) if v.is_object() => v,
        _ => data,
    };
    Message::deserialize(inner).ok().filter(|m| !m.id.is_empty() && !m.conversation_id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frame_round_trips_event_name() {
        let frame = Frame::parse(r#"{"event":"groupUserTyping","data":{"groupId":"g1","userId":"u1","userName":"Ravi","isTyping":true}}"#).unwrap();
        assert_eq!(frame.event, GROUP_USER_TYPING);
        match ServerEvent::decode(&frame.event, &frame.data) {
            Some(ServerEvent::GroupUserTyping(t)) => {
                assert_eq!(t.group_id, "g1");
                assert!(t.is_typing);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrapped_message_payload_is_unwrapped() {
        let data = json!({ "message": {
            "id": "m1", "chatId": "c1", "senderId": "d1", "senderRole": "dealer",
            "text": "Price?", "createdAt": "2024-03-01T09:00:00Z"
        }});
        match ServerEvent::decode(CHAT_MESSAGE, &data) {
            Some(ServerEvent::ChatMessage(m)) => assert_eq!(m.conversation_id, "c1"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn malformed_payload_is_dropped() {
        assert!(ServerEvent::decode(GROUP_MESSAGE, &json!({ "text": "no ids" })).is_none());
        assert!(ServerEvent::decode(GROUP_USER_TYPING, &Value::Null).is_none());
        let blank_id = json!({
            "id": "", "groupId": "g1", "senderId": "s1", "senderRole": "seller",
            "text": "hi", "createdAt": "2024-01-01T10:00:00Z"
        });
        assert!(ServerEvent::decode(GROUP_MESSAGE, &blank_id).is_none());
    }
}
