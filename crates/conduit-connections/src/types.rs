use serde::{Deserialize, Serialize};

/// A live WebSocket session, mapped to the identity that opened it (§4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub connection_id: String,
    pub unified_user_id: String,
    pub email: Option<String>,
    pub connected_at: String,
    pub last_activity: String,
}
