use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8089;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const MAX_TELEGRAM_FILE_BYTES: u64 = 20 * 1024 * 1024; // 20 MB cap (§4.4.1)
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;
pub const BINDING_CODE_TTL_SECS: i64 = 300;
pub const BINDING_CODE_STORAGE_BUFFER_SECS: i64 = 300;
pub const CONNECTION_TTL_SECS: i64 = 2 * 60 * 60;
pub const HISTORY_TTL_DAYS: i64 = 90;
pub const CONVERSATION_GAP_SECS: i64 = 60 * 60;
pub const FAILED_LOGIN_WINDOW_SECS: i64 = 15 * 60;
pub const FAILED_LOGIN_MAX_ATTEMPTS: u32 = 5;
pub const WEB_TOKEN_LIFETIME_SECS: i64 = 7 * 24 * 60 * 60;
pub const WS_HEARTBEAT_INTERVAL_SECS: u64 = 30;
pub const WS_MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Top-level config: `conduit.toml` + `CONDUIT_*` env overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConduitConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub telegram: Option<TelegramConfig>,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub webhooks: WebhooksConfig,
}

impl Default for ConduitConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            telegram: None,
            bus: BusConfig::default(),
            auth: AuthConfig::default(),
            rate_limit: RateLimitConfig::default(),
            webhooks: WebhooksConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Value expected in `X-Telegram-Bot-Api-Secret-Token`. When unset,
    /// verification is disabled (development posture, per §4.4.1).
    pub webhook_secret: Option<String>,
    /// Base path/bucket for uploaded media attachments (opaque — treated as
    /// an object-storage key prefix; the actual storage backend is external).
    #[serde(default = "default_object_storage_base")]
    pub object_storage_base: String,
}

fn default_object_storage_base() -> String {
    "conduit-attachments".to_string()
}

/// Event-bus backend selection. `InMemory` is used for local/dev/test;
/// `Nats` talks to a real managed bus.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BusConfig {
    #[default]
    InMemory,
    Nats {
        url: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HMAC signing secret for web auth JWTs. Must be overridden in
    /// production via `CONDUIT_AUTH_JWT_SECRET`.
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_lifetime_secs: default_token_lifetime(),
        }
    }
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_token_lifetime() -> i64 {
    WEB_TOKEN_LIFETIME_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_failed_login_window")]
    pub failed_login_window_secs: i64,
    #[serde(default = "default_failed_login_max")]
    pub failed_login_max_attempts: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            failed_login_window_secs: default_failed_login_window(),
            failed_login_max_attempts: default_failed_login_max(),
        }
    }
}

fn default_failed_login_window() -> i64 {
    FAILED_LOGIN_WINDOW_SECS
}
fn default_failed_login_max() -> u32 {
    FAILED_LOGIN_MAX_ATTEMPTS
}

/// Authentication mode for an incoming admin/debug webhook surface, retained
/// from the ambient webhook-auth convention for any future provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum WebhookAuthMode {
    HmacSha256,
    BearerToken,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookSourceConfig {
    pub name: String,
    pub secret: Option<String>,
    pub auth_mode: WebhookAuthMode,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WebhooksConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub sources: Vec<WebhookSourceConfig>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.conduit/conduit.db", home)
}

impl ConduitConfig {
    /// Load config from a TOML file with `CONDUIT_*` env var overrides.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: ConduitConfig = Figment::from(figment::providers::Serialized::defaults(
            ConduitConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("CONDUIT_").split("_"))
        .extract()
        .map_err(|e| crate::error::ConduitError::InvalidInput(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.conduit/conduit.toml", home)
}
