use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingStatus {
    WebOnly,
    TelegramOnly,
    Complete,
}

impl BindingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingStatus::WebOnly => "web_only",
            BindingStatus::TelegramOnly => "telegram_only",
            BindingStatus::Complete => "complete",
        }
    }
}

impl std::str::FromStr for BindingStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web_only" => Ok(BindingStatus::WebOnly),
            "telegram_only" => Ok(BindingStatus::TelegramOnly),
            "complete" => Ok(BindingStatus::Complete),
            other => Err(format!("unknown binding_status: {other}")),
        }
    }
}

/// The canonical identity (§3 "UnifiedUser").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedUser {
    pub unified_user_id: String,
    pub web_email: Option<String>,
    pub telegram_chat_id: Option<i64>,
    pub binding_status: BindingStatus,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WebRole {
    #[default]
    User,
    Admin,
}

impl WebRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, WebRole::Admin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebRole::User => "user",
            WebRole::Admin => "admin",
        }
    }
}

impl std::str::FromStr for WebRole {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(WebRole::User),
            "admin" => Ok(WebRole::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// §3 "WebUser". Never deleted, only disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebUser {
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub enabled: bool,
    pub role: WebRole,
    pub require_password_change: bool,
    pub created_at: String,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingCodeStatus {
    Pending,
    Used,
    Expired,
}

impl BindingCodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BindingCodeStatus::Pending => "pending",
            BindingCodeStatus::Used => "used",
            BindingCodeStatus::Expired => "expired",
        }
    }
}

impl std::str::FromStr for BindingCodeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BindingCodeStatus::Pending),
            "used" => Ok(BindingCodeStatus::Used),
            "expired" => Ok(BindingCodeStatus::Expired),
            other => Err(format!("unknown binding code status: {other}")),
        }
    }
}

/// §3 "BindingCode" — ephemeral 6-digit code exchanged from Telegram.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingCode {
    pub code: String,
    pub web_email: String,
    pub created_at: String,
    pub expires_at: String,
    pub status: BindingCodeStatus,
}

/// §3 "AllowlistEntry" — keyed by Telegram chat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowlistEntry {
    pub chat_id: i64,
    pub username: Option<String>,
    pub enabled: bool,
    pub role: WebRole,
    pub permissions: serde_json::Value,
}

impl AllowlistEntry {
    pub fn has_permission(&self, key: &str) -> bool {
        self.permissions
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}
