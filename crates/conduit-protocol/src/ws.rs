//! Wire frames for the browser WebSocket surface (§6 "WebSocket surface").

use serde::{Deserialize, Serialize};

/// `$default` inbound frame: `{"action":"sendMessage","message":"..."}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientFrame {
    SendMessage { message: String },
}

/// Server-initiated frame delivered by the Response Router on the web path.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Message {
        content: String,
        timestamp: String,
    },
    Error {
        content: String,
        timestamp: String,
    },
}

impl ServerFrame {
    pub fn message(content: impl Into<String>) -> Self {
        ServerFrame::Message {
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        ServerFrame::Error {
            content: content.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_frame_parses_send_message() {
        let raw = r#"{"action":"sendMessage","message":"hi"}"#;
        let frame: ClientFrame = serde_json::from_str(raw).unwrap();
        match frame {
            ClientFrame::SendMessage { message } => assert_eq!(message, "hi"),
        }
    }

    #[test]
    fn server_frame_serializes_with_type_tag() {
        let frame = ServerFrame::message("hello");
        let v = serde_json::to_value(&frame).unwrap();
        assert_eq!(v["type"], "message");
        assert_eq!(v["content"], "hello");
    }
}
