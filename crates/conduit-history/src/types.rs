use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// §3 "HistoryMessage" — one turn, keyed by `(unified_user_id, timestamp_msgid)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub unified_user_id: String,
    pub timestamp_msgid: String,
    pub role: Role,
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    pub channel: String,
    pub conversation_id: Option<String>,
}

/// §3 "Conversation".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub unified_user_id: String,
    pub conversation_id: String,
    pub title: String,
    pub created_at: String,
    pub last_message_time: String,
    pub message_count: u64,
    pub is_pinned: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationList {
    pub pinned: Vec<Conversation>,
    pub recent: Vec<Conversation>,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketedHistory {
    pub today: Vec<HistoryMessage>,
    pub yesterday: Vec<HistoryMessage>,
    pub this_week: Vec<HistoryMessage>,
    pub earlier: Vec<HistoryMessage>,
}
