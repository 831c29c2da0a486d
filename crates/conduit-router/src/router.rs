//! The Response Router itself (§4.7): consumes `message.completed` /
//! `message.failed` and drives format → deliver → persist → emit-metrics.

use std::sync::Arc;
use std::time::Instant;

use tracing::{instrument, warn};

use conduit_connections::ConnectionRegistry;
use conduit_history::HistoryManager;
use conduit_protocol::events::{EventChannelRef, MessageCompletedDetail, MessageFailedDetail};

use crate::delivery::{parse_telegram_user_id, split_for_telegram, DeliveryError, TelegramSender, WebSender};
use crate::format::{Formatter, TelegramFormatter, WebFormatter};
use crate::metrics_emit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSuccess {
    pub message_id: String,
    pub channel: String,
    pub user_id: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFailure {
    pub message_id: Option<String>,
    pub channel: Option<String>,
    pub error: String,
}

pub struct ResponseRouter {
    history: Arc<HistoryManager>,
    connections: Arc<ConnectionRegistry>,
    telegram: Arc<dyn TelegramSender>,
    web: Arc<dyn WebSender>,
    telegram_formatter: TelegramFormatter,
    web_formatter: WebFormatter,
}

impl ResponseRouter {
    pub fn new(
        history: Arc<HistoryManager>,
        connections: Arc<ConnectionRegistry>,
        telegram: Arc<dyn TelegramSender>,
        web: Arc<dyn WebSender>,
    ) -> Self {
        Self {
            history,
            connections,
            telegram,
            web,
            telegram_formatter: TelegramFormatter,
            web_formatter: WebFormatter,
        }
    }

    #[instrument(skip(self, detail), fields(message_id = %detail.message_id))]
    pub async fn route_completed(&self, detail: MessageCompletedDetail) -> Result<RouteSuccess, RouteFailure> {
        let start = Instant::now();

        if let Err(reason) = validate_completed(&detail) {
            metrics_emit::invalid_event();
            return Err(RouteFailure {
                message_id: Some(detail.message_id),
                channel: Some(detail.channel.kind),
                error: reason,
            });
        }

        let channel = detail.channel.kind.clone();
        let formatted = self.format_for(&channel, &detail.response, &detail.metadata);

        let delivery = self.deliver(&channel, &detail.channel, &detail.user.id, &formatted).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match delivery {
            Ok(()) => {
                self.persist_turn(&detail);
                metrics_emit::success(&channel, duration_ms);
                Ok(RouteSuccess {
                    message_id: detail.message_id,
                    channel,
                    user_id: detail.user.id,
                    duration_ms,
                })
            }
            Err(e) => {
                metrics_emit::failure(&channel, duration_ms);
                Err(RouteFailure {
                    message_id: Some(detail.message_id),
                    channel: Some(channel),
                    error: e.to_string(),
                })
            }
        }
    }

    #[instrument(skip(self, detail), fields(message_id = %detail.message_id))]
    pub async fn route_failed(&self, detail: MessageFailedDetail) -> Result<RouteSuccess, RouteFailure> {
        let start = Instant::now();

        if detail.message_id.is_empty() || detail.channel.channel_id.is_empty() || detail.user.id.is_empty() {
            metrics_emit::invalid_event();
            return Err(RouteFailure {
                message_id: Some(detail.message_id),
                channel: Some(detail.channel.kind),
                error: "missing required fields on message.failed event".to_string(),
            });
        }

        let channel = detail.channel.kind.clone();
        let friendly = friendly_message_for_kind(detail.error_kind.as_deref());
        let formatted = self.format_for(&channel, &friendly, &detail.metadata);

        let delivery = self.deliver(&channel, &detail.channel, &detail.user.id, &formatted).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match delivery {
            Ok(()) => {
                metrics_emit::success(&channel, duration_ms);
                Ok(RouteSuccess {
                    message_id: detail.message_id,
                    channel,
                    user_id: detail.user.id,
                    duration_ms,
                })
            }
            Err(e) => {
                metrics_emit::failure(&channel, duration_ms);
                Err(RouteFailure {
                    message_id: Some(detail.message_id),
                    channel: Some(channel),
                    error: e.to_string(),
                })
            }
        }
    }

    fn format_for(&self, channel: &str, content: &str, metadata: &serde_json::Value) -> String {
        match channel {
            "telegram" => self.telegram_formatter.format(content, metadata),
            _ => self.web_formatter.format(content, metadata),
        }
    }

    async fn deliver(
        &self,
        channel: &str,
        channel_ref: &EventChannelRef,
        user_id: &str,
        formatted: &str,
    ) -> Result<(), DeliveryError> {
        match channel {
            "telegram" => {
                let chat_id = parse_telegram_user_id(user_id)?;
                for chunk in split_for_telegram(formatted) {
                    self.telegram.send_chunk(chat_id, &chunk).await?;
                }
                Ok(())
            }
            "web" => {
                let connection_id = &channel_ref.channel_id;
                match self.web.send_frame(connection_id, formatted).await {
                    Ok(()) => Ok(()),
                    Err(DeliveryError::ConnectionGone(id)) => {
                        self.connections.disconnect(&id);
                        Err(DeliveryError::ConnectionGone(id))
                    }
                    Err(e) => Err(e),
                }
            }
            other => {
                metrics_emit::unsupported_channel(other);
                Err(DeliveryError::Transport(format!("unsupported channel: {other}")))
            }
        }
    }

    /// Writes the two HistoryMessage rows for a completed exchange.
    /// Best-effort: a write failure never invalidates a delivered reply.
    fn persist_turn(&self, detail: &MessageCompletedDetail) {
        let unified_user_id = match detail.user.unified_user_id.as_deref() {
            Some(id) => id,
            None => {
                warn!(message_id = %detail.message_id, "no unified_user_id on completed event, skipping history write");
                return;
            }
        };
        let user_text = detail.original_text.as_deref().unwrap_or("");
        self.history.record_exchange_best_effort(
            unified_user_id,
            &detail.channel.kind,
            detail.conversation_id.as_deref(),
            user_text,
            &detail.response,
        );
    }
}

fn validate_completed(detail: &MessageCompletedDetail) -> Result<(), String> {
    if detail.message_id.is_empty() {
        return Err("missing messageId".to_string());
    }
    if detail.channel.channel_id.is_empty() {
        return Err("missing channel".to_string());
    }
    if detail.user.id.is_empty() {
        return Err("missing user".to_string());
    }
    if detail.response.is_empty() {
        return Err("missing response".to_string());
    }
    Ok(())
}

/// Maps the processor's `error_kind` tag to the §7 friendly-text taxonomy.
/// Never surfaces the raw exception string.
fn friendly_message_for_kind(kind: Option<&str>) -> String {
    match kind {
        Some("stream_error") => "AI service temporarily unavailable, please retry".to_string(),
        Some("context_overflow") => {
            "Conversation history is too large — use /new to start a fresh conversation".to_string()
        }
        Some("dependency_error") => "System busy, please try again shortly".to_string(),
        Some("rate_limited") => "Too many attempts, please wait and try again".to_string(),
        Some("invalid_input") => "That request could not be processed".to_string(),
        _ => "Something went wrong processing your request, please try again".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conduit_protocol::events::EventUserRef;
    use rusqlite::Connection;
    use std::sync::Mutex as StdMutex;

    struct RecordingTelegram {
        sent: StdMutex<Vec<(i64, String)>>,
    }
    impl RecordingTelegram {
        fn new() -> Self {
            Self { sent: StdMutex::new(Vec::new()) }
        }
    }
    #[async_trait]
    impl TelegramSender for RecordingTelegram {
        async fn send_chunk(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(())
        }
    }

    struct RecordingWeb {
        sent: StdMutex<Vec<(String, String)>>,
        gone: bool,
    }
    impl RecordingWeb {
        fn new(gone: bool) -> Self {
            Self { sent: StdMutex::new(Vec::new()), gone }
        }
    }
    #[async_trait]
    impl WebSender for RecordingWeb {
        async fn send_frame(&self, connection_id: &str, content: &str) -> Result<(), DeliveryError> {
            if self.gone {
                return Err(DeliveryError::ConnectionGone(connection_id.to_string()));
            }
            self.sent.lock().unwrap().push((connection_id.to_string(), content.to_string()));
            Ok(())
        }
    }

    fn make_router(telegram_gone: bool, web_gone: bool) -> (ResponseRouter, Arc<RecordingTelegram>, Arc<RecordingWeb>, Arc<ConnectionRegistry>) {
        let _ = telegram_gone;
        let conn = Connection::open_in_memory().unwrap();
        let history = Arc::new(HistoryManager::new(conn).unwrap());
        let connections = Arc::new(ConnectionRegistry::new());
        let telegram = Arc::new(RecordingTelegram::new());
        let web = Arc::new(RecordingWeb::new(web_gone));
        let router = ResponseRouter::new(history, connections.clone(), telegram.clone(), web.clone());
        (router, telegram, web, connections)
    }

    fn completed_detail(channel_kind: &str, channel_id: &str, user_id: &str) -> MessageCompletedDetail {
        MessageCompletedDetail {
            message_id: "m1".to_string(),
            channel: EventChannelRef { kind: channel_kind.to_string(), channel_id: channel_id.to_string() },
            user: EventUserRef {
                id: user_id.to_string(),
                username: None,
                unified_user_id: Some("u1".to_string()),
            },
            response: "hello there".to_string(),
            metadata: serde_json::json!({}),
            original_text: Some("hi".to_string()),
            conversation_id: None,
        }
    }

    #[tokio::test]
    async fn routes_telegram_completion_successfully() {
        let (router, telegram, _web, _connections) = make_router(false, false);
        let detail = completed_detail("telegram", "ignored", "tg:42");
        let result = router.route_completed(detail).await.unwrap();
        assert_eq!(result.channel, "telegram");
        assert_eq!(telegram.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn routes_web_completion_successfully() {
        let (router, _telegram, web, _connections) = make_router(false, false);
        let detail = completed_detail("web", "conn-1", "conn-1");
        let result = router.route_completed(detail).await.unwrap();
        assert_eq!(result.channel, "web");
        assert_eq!(web.sent.lock().unwrap()[0].0, "conn-1");
    }

    #[tokio::test]
    async fn web_delivery_gone_disconnects_registry_entry() {
        let (router, _telegram, _web, connections) = make_router(false, true);
        connections.connect("conn-1", "u1", None);
        let detail = completed_detail("web", "conn-1", "conn-1");
        let err = router.route_completed(detail).await.unwrap_err();
        assert!(err.error.contains("connection"));
        assert!(connections.get("conn-1").is_none());
    }

    #[tokio::test]
    async fn unsupported_channel_fails_without_delivery_attempt() {
        let (router, telegram, web, _connections) = make_router(false, false);
        let detail = completed_detail("discord", "x", "x");
        let err = router.route_completed(detail).await.unwrap_err();
        assert_eq!(err.channel.as_deref(), Some("discord"));
        assert!(telegram.sent.lock().unwrap().is_empty());
        assert!(web.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_response_is_invalid_event() {
        let (router, ..) = make_router(false, false);
        let mut detail = completed_detail("telegram", "x", "tg:1");
        detail.response = String::new();
        let err = router.route_completed(detail).await.unwrap_err();
        assert!(err.error.contains("response"));
    }

    #[tokio::test]
    async fn failed_event_delivers_friendly_message() {
        let (router, telegram, ..) = make_router(false, false);
        let detail = MessageFailedDetail {
            message_id: "m2".to_string(),
            channel: EventChannelRef { kind: "telegram".to_string(), channel_id: "x".to_string() },
            user: EventUserRef { id: "tg:42".to_string(), username: None, unified_user_id: Some("u1".to_string()) },
            error: "panic: nil pointer at frame.rs:88".to_string(),
            error_kind: Some("stream_error".to_string()),
            metadata: serde_json::json!({}),
        };
        router.route_failed(detail).await.unwrap();
        let sent = telegram.sent.lock().unwrap();
        assert!(sent[0].1.contains("temporarily unavailable"));
        assert!(!sent[0].1.contains("nil pointer"));
    }
}
