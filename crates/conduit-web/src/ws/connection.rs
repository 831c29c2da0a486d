//! The browser WebSocket surface (§4.4.2, §6): `$connect` resolves the JWT
//! and registers a `Connection`, `$default` publishes straight to the
//! dispatch fabric — no Command Router involvement here, that's a
//! Telegram-ingress concept.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{info, warn};

use conduit_bus::subjects::DETAIL_TYPE_RECEIVED;
use conduit_core::config::{WS_HEARTBEAT_INTERVAL_SECS, WS_MAX_PAYLOAD_BYTES};
use conduit_core::ids::ConnectionId;
use conduit_identity::auth::verify_token;
use conduit_identity::users;
use conduit_protocol::envelope::{ChannelRef, ChannelType, ContentRef, MessageType, UniversalMessage, UserRef};
use conduit_protocol::ws::{ClientFrame, ServerFrame};

use crate::app::AppState;

#[derive(Deserialize)]
pub struct ConnectQuery {
    token: String,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<ConnectQuery>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state, q.token))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>, token: String) {
    let claims = match verify_token(&state.config.auth.jwt_secret, &token) {
        Ok(c) => c,
        Err(e) => {
            warn!(error = %e, "rejecting websocket, invalid token");
            return;
        }
    };

    let unified_user_id = {
        let conn = state.identity_db.lock().unwrap();
        match users::resolve_or_create_by_email(&conn, &claims.sub) {
            Ok(u) => u.unified_user_id,
            Err(e) => {
                warn!(error = %e, "rejecting websocket, identity resolution failed");
                return;
            }
        }
    };

    let connection_id = ConnectionId::new().to_string();
    state.connections.connect(&connection_id, &unified_user_id, Some(&claims.sub));

    let (mut sink, mut stream) = socket.split();
    let (tx, mut outbound) = mpsc::unbounded_channel::<ServerFrame>();
    state.ws_clients.insert(connection_id.clone(), tx);

    info!(connection_id, unified_user_id, "websocket connected");

    let mut tick = tokio::time::interval(Duration::from_secs(WS_HEARTBEAT_INTERVAL_SECS));
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if text.len() > WS_MAX_PAYLOAD_BYTES {
                            warn!(connection_id, size = text.len(), "payload too large, closing");
                            break;
                        }
                        if let Err(e) = handle_client_frame(&text, &connection_id, &unified_user_id, &claims.sub, &state).await {
                            warn!(connection_id, error = %e, "failed to publish inbound message");
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(connection_id, error = %e, "websocket read error");
                        break;
                    }
                    _ => {}
                }
            }

            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        let payload = serde_json::to_string(&frame).unwrap_or_default();
                        if sink.send(Message::Text(payload.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }

            _ = tick.tick() => {
                let ping = json!({"type": "ping"}).to_string();
                if sink.send(Message::Text(ping.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.ws_clients.remove(&connection_id);
    state.connections.disconnect(&connection_id);
    info!(connection_id, "websocket disconnected");
}

async fn handle_client_frame(
    text: &str,
    connection_id: &str,
    unified_user_id: &str,
    email: &str,
    state: &Arc<AppState>,
) -> anyhow::Result<()> {
    let frame: ClientFrame = serde_json::from_str(text)?;
    let ClientFrame::SendMessage { message } = frame;

    state.connections.touch(connection_id)?;

    let channel = ChannelRef {
        kind: ChannelType::Web,
        channel_id: connection_id.to_string(),
        metadata: json!({}),
    };
    let user = UserRef {
        id: format!("web:{connection_id}"),
        channel_user_id: connection_id.to_string(),
        username: Some(email.to_string()),
        display_name: Some(email.to_string()),
        unified_user_id: Some(unified_user_id.to_string()),
    };
    let content = ContentRef {
        text: message,
        message_type: MessageType::Text,
        attachments: vec![],
    };

    let envelope = UniversalMessage::new(channel, user, content);
    state
        .bus
        .publish_value(DETAIL_TYPE_RECEIVED, serde_json::to_value(&envelope.without_raw())?)
        .await?;
    Ok(())
}
