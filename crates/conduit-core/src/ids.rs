use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier in the `unified_user_id` graph (§3). UUIDv7 so log
/// lines sort chronologically without a separate index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnifiedUserId(pub String);

impl UnifiedUserId {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for UnifiedUserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UnifiedUserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UnifiedUserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UnifiedUserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-WebSocket-session identifier (the gateway's `connection_id`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConnectionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// `timestamp_msgid` sort key for HistoryMessage: `<ISO-8601 UTC>#<uuid>`.
/// Lexicographic order equals chronological order because the timestamp
/// prefix is fixed-width RFC3339 with a 'Z' suffix and the uuid only breaks
/// ties within the same instant.
pub fn new_timestamp_msgid() -> String {
    let ts = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    format!("{}#{}", ts, Uuid::new_v4())
}

/// Splits a `timestamp_msgid` back into its timestamp and uuid halves.
pub fn split_timestamp_msgid(key: &str) -> Option<(&str, &str)> {
    key.split_once('#')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_msgid_sorts_chronologically() {
        let a = new_timestamp_msgid();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_timestamp_msgid();
        assert!(a < b, "{a} should sort before {b}");
    }

    #[test]
    fn split_roundtrips() {
        let key = new_timestamp_msgid();
        let (ts, id) = split_timestamp_msgid(&key).unwrap();
        assert!(!ts.is_empty());
        assert!(!id.is_empty());
    }
}
