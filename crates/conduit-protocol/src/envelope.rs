//! The Universal Message envelope (§3) — the one schema every ingress
//! adapter normalizes into before publishing `message.received`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Telegram,
    Web,
}

impl ChannelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Telegram => "telegram",
            ChannelType::Web => "web",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Video,
    Audio,
    File,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRef {
    #[serde(rename = "type")]
    pub kind: ChannelType,
    pub channel_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRef {
    /// Channel-qualified id, e.g. `tg:316743844` or the raw `connection_id` for web.
    pub id: String,
    pub channel_user_id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
    pub unified_user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    Telegram {
        #[serde(rename = "type")]
        kind: String,
        file_id: String,
        file_name: Option<String>,
        mime_type: Option<String>,
        file_size: Option<u64>,
        s3_url: Option<String>,
        #[serde(default)]
        permission_denied: bool,
        task: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRef {
    pub text: String,
    pub message_type: MessageType,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContextRef {
    pub conversation_id: Option<String>,
    pub session_id: Option<String>,
    pub thread_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RoutingRef {
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub tags: Vec<String>,
    pub target_agent: Option<String>,
}

/// In-flight envelope. Never stored as-is; history persists the two turns
/// it produces, not the envelope itself. The `raw` provider payload must be
/// stripped (`without_raw`) before publishing to the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversalMessage {
    pub message_id: String,
    pub timestamp: String,
    pub channel: ChannelRef,
    pub user: UserRef,
    pub content: ContentRef,
    pub context: ContextRef,
    pub routing: RoutingRef,
    /// Provider-native payload, kept only for the adapter's own legacy
    /// mirror/dual-write; stripped before the bus publish.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}

impl UniversalMessage {
    pub fn new(channel: ChannelRef, user: UserRef, content: ContentRef) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            channel,
            user,
            content,
            context: ContextRef::default(),
            routing: RoutingRef::default(),
            raw: None,
        }
    }

    /// Returns a clone with `raw` cleared, bounding the event published to
    /// the dispatch fabric (§3: "raw ... must be stripped before publishing").
    pub fn without_raw(&self) -> Self {
        let mut m = self.clone();
        m.raw = None;
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_raw_strips_only_raw_field() {
        let mut msg = UniversalMessage::new(
            ChannelRef {
                kind: ChannelType::Telegram,
                channel_id: "316743844".into(),
                metadata: serde_json::json!({}),
            },
            UserRef {
                id: "tg:316743844".into(),
                channel_user_id: "316743844".into(),
                username: Some("qwer2003tw".into()),
                display_name: Some("Steven".into()),
                unified_user_id: None,
            },
            ContentRef {
                text: "hello".into(),
                message_type: MessageType::Text,
                attachments: vec![],
            },
        );
        msg.raw = Some(serde_json::json!({"update_id": 1}));

        let stripped = msg.without_raw();
        assert!(stripped.raw.is_none());
        assert_eq!(stripped.content.text, "hello");
        assert!(msg.raw.is_some(), "original must be untouched");
    }
}
