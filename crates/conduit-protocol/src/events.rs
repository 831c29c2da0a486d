//! Detail payloads for the two event kinds on the dispatch fabric (§4.6).

use serde::{Deserialize, Serialize};

use crate::envelope::UniversalMessage;

pub const SOURCE_INGRESS: &str = "universal-adapter";
pub const SOURCE_PROCESSOR: &str = "agent-processor";

pub const DETAIL_TYPE_RECEIVED: &str = "message.received";
pub const DETAIL_TYPE_COMPLETED: &str = "message.completed";
pub const DETAIL_TYPE_FAILED: &str = "message.failed";

/// Published by an ingress adapter. `detail` is the envelope with `raw` stripped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageReceived {
    pub source: String,
    pub detail: UniversalMessage,
}

impl MessageReceived {
    pub fn new(detail: UniversalMessage) -> Self {
        Self {
            source: SOURCE_INGRESS.to_string(),
            detail: detail.without_raw(),
        }
    }
}

/// User/channel identification carried on completion events — enough for
/// the response router to deliver and persist without re-resolving identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventUserRef {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub unified_user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventChannelRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub channel_id: String,
}

/// Published by the external processor once it has computed a reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCompletedDetail {
    pub message_id: String,
    pub channel: EventChannelRef,
    pub user: EventUserRef,
    pub response: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Original user text, carried so the router can reconstruct the user
    /// turn for history without a second lookup (§4.7 step 5).
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageCompleted {
    pub source: String,
    pub detail: MessageCompletedDetail,
}

impl MessageCompleted {
    pub fn new(detail: MessageCompletedDetail) -> Self {
        Self {
            source: SOURCE_PROCESSOR.to_string(),
            detail,
        }
    }
}

/// Published when the processor gives up. Delivered to the user as a
/// friendly string chosen from the §7 taxonomy, never the raw error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFailedDetail {
    pub message_id: String,
    pub channel: EventChannelRef,
    pub user: EventUserRef,
    pub error: String,
    #[serde(default)]
    pub error_kind: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageFailed {
    pub source: String,
    pub detail: MessageFailedDetail,
}

impl MessageFailed {
    pub fn new(detail: MessageFailedDetail) -> Self {
        Self {
            source: SOURCE_PROCESSOR.to_string(),
            detail,
        }
    }
}
