//! The Telegram ingress endpoint (§4.4.1, §6): verifies the webhook secret,
//! normalizes the update into a `UniversalMessage`, and either hands it to
//! the command router (for `/`-prefixed text) or publishes it to the event
//! bus for the external processor.

use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::post;
use axum::Router;
use serde_json::{json, Value};
use teloxide::prelude::*;
use tracing::warn;

use conduit_bus::subjects::DETAIL_TYPE_RECEIVED;
use conduit_bus::BusClient;
use conduit_commands::{CommandContext, CommandRouter, RouteOutcome};
use conduit_core::config::TelegramConfig;
use conduit_identity::{allowlist, permissions, users};
use conduit_protocol::envelope::{ChannelRef, ChannelType, ContentRef, MessageType, UniversalMessage, UserRef};
use conduit_router::{split_for_telegram, TelegramSender};

use crate::error::TelegramIngressError;
use crate::media::{self, MediaOutcome, ObjectStore};
use crate::update::{parse_update, ParseOutcome};

const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";
const LEGACY_MIRROR_SUBJECT: &str = "telegram.inbound";

impl IntoResponse for TelegramIngressError {
    fn into_response(self) -> Response {
        let status = match &self {
            TelegramIngressError::SecretMismatch => StatusCode::FORBIDDEN,
            TelegramIngressError::InvalidBody | TelegramIngressError::AttachmentTooLarge(_) => {
                StatusCode::BAD_REQUEST
            }
            TelegramIngressError::Bus(_) | TelegramIngressError::ObjectStore(_) => StatusCode::OK,
        };
        let status_tag = match &self {
            TelegramIngressError::SecretMismatch => "forbidden",
            TelegramIngressError::InvalidBody | TelegramIngressError::AttachmentTooLarge(_) => "invalid_input",
            TelegramIngressError::Bus(_) => "sqs_failed",
            TelegramIngressError::ObjectStore(_) => "error",
        };
        (status, Json(json!({"status": status_tag, "message": self.to_string()}))).into_response()
    }
}

pub struct TelegramState {
    pub config: TelegramConfig,
    pub identity_db: Mutex<rusqlite::Connection>,
    pub history_db: Mutex<rusqlite::Connection>,
    pub commands: CommandRouter,
    pub bus: Arc<dyn BusClient>,
    pub object_store: Arc<dyn ObjectStore>,
    pub bot: Bot,
    pub sender: Arc<dyn TelegramSender>,
}

pub fn webhook_router() -> Router<Arc<TelegramState>> {
    Router::new().route("/webhook", post(handle_webhook))
}

async fn handle_webhook(
    State(state): State<Arc<TelegramState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match handle_webhook_inner(state, headers, body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle_webhook_inner(
    state: Arc<TelegramState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, TelegramIngressError> {
    if let Some(expected) = &state.config.webhook_secret {
        let provided = headers
            .iter()
            .find(|(name, _)| name.as_str().eq_ignore_ascii_case(SECRET_HEADER))
            .and_then(|(_, value)| value.to_str().ok());
        if provided != Some(expected.as_str()) {
            return Err(TelegramIngressError::SecretMismatch);
        }
    }

    let raw: Value = serde_json::from_slice(&body).map_err(|_| TelegramIngressError::InvalidBody)?;
    let parsed = match parse_update(&raw) {
        ParseOutcome::Message(parsed) => parsed,
        ParseOutcome::NotAMessage => {
            return Ok((StatusCode::OK, Json(json!({"status": "ignored"}))).into_response());
        }
        ParseOutcome::Unparseable => {
            return Err(TelegramIngressError::InvalidBody);
        }
    };

    let text = parsed.text.clone().unwrap_or_default();

    if text.trim_start().starts_with('/') {
        let route_outcome = {
            let identity_conn = state.identity_db.lock().unwrap();
            let history_conn = state.history_db.lock().unwrap();
            let deployment = conduit_commands::deployment::StaticDeploymentInfo {
                descriptor: conduit_commands::deployment::DeploymentDescriptor {
                    stack_name: "conduit".to_string(),
                    status: "active".to_string(),
                    last_updated: conduit_core::time::now_rfc3339(),
                },
            };
            let ctx = CommandContext {
                identity_conn: &identity_conn,
                history_conn: &history_conn,
                chat_id: parsed.chat_id,
                username: parsed.username.clone(),
                text: text.clone(),
                raw_event: raw.clone(),
                deployment: &deployment,
            };

            state.commands.route(&ctx)
        };

        if let RouteOutcome::Handled(outcome) = route_outcome {
            deliver_text(&state, parsed.chat_id, &outcome.reply).await;
            for (chat_id, text) in &outcome.fanout {
                deliver_text(&state, *chat_id, text).await;
            }
            return Ok((StatusCode::OK, Json(json!({"status": "command_handled"}))).into_response());
        }
    }

    let allowed = {
        let identity_conn = state.identity_db.lock().unwrap();
        allowlist::is_allowed(&identity_conn, parsed.chat_id).unwrap_or(false)
    };
    if !allowed {
        return Ok((StatusCode::OK, Json(json!({"status": "ignored"}))).into_response());
    }

    let unified_user_id = {
        let identity_conn = state.identity_db.lock().unwrap();
        users::resolve_or_create_by_telegram_chat_id(&identity_conn, parsed.chat_id)
            .ok()
            .map(|u| u.unified_user_id)
    };

    let mut attachments = Vec::new();
    if let Some(media_ref) = &parsed.media {
        let has_permission = {
            let identity_conn = state.identity_db.lock().unwrap();
            permissions::is_admin(&identity_conn, parsed.chat_id).unwrap_or(false)
                || allowlist::get(&identity_conn, parsed.chat_id)
                    .ok()
                    .flatten()
                    .map(|e| e.has_permission("file_reader"))
                    .unwrap_or(false)
        };

        match media::fetch_and_store(
            &state.bot,
            state.object_store.as_ref(),
            &state.config.object_storage_base,
            parsed.chat_id,
            parsed.message_id,
            media_ref,
            has_permission,
        )
        .await
        {
            Ok(MediaOutcome::Uploaded(attachment)) | Ok(MediaOutcome::PermissionDenied(attachment)) => {
                attachments.push(attachment);
            }
            Ok(MediaOutcome::TooLarge(limit)) => {
                return Err(TelegramIngressError::AttachmentTooLarge(limit));
            }
            Err(e) => return Err(TelegramIngressError::from(e)),
        }
    }

    let channel = ChannelRef {
        kind: ChannelType::Telegram,
        channel_id: parsed.chat_id.to_string(),
        metadata: json!({}),
    };
    let user = UserRef {
        id: format!("tg:{}", parsed.chat_id),
        channel_user_id: parsed.chat_id.to_string(),
        username: parsed.username.clone(),
        display_name: parsed.username.clone(),
        unified_user_id,
    };
    let content = ContentRef {
        text,
        message_type: MessageType::Text,
        attachments,
    };

    let mut message = UniversalMessage::new(channel, user, content);
    message.raw = Some(raw);

    let mirror = message.clone();
    let envelope = message.without_raw();

    let response = match state
        .bus
        .publish_value(DETAIL_TYPE_RECEIVED, serde_json::to_value(&envelope).unwrap_or(json!({})))
        .await
    {
        Ok(()) => {
            if let Err(e) = state
                .bus
                .publish_value(LEGACY_MIRROR_SUBJECT, serde_json::to_value(&mirror).unwrap_or(json!({})))
                .await
            {
                warn!(error = %e, "legacy mirror publish failed, continuing");
            }
            (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "bus publish failed");
            (StatusCode::OK, Json(json!({"status": "sqs_failed"}))).into_response()
        }
    };
    Ok(response)
}

async fn deliver_text(state: &TelegramState, chat_id: i64, text: &str) {
    for chunk in split_for_telegram(text) {
        if let Err(e) = state.sender.send_chunk(chat_id, &chunk).await {
            warn!(chat_id, error = %e, "failed to deliver command reply");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_header_name_is_lowercase_constant() {
        assert_eq!(SECRET_HEADER, "x-telegram-bot-api-secret-token");
    }
}
