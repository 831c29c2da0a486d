//! `WebSender` implementation backing the response router's `web` channel
//! (§4.7 step 4): looks up the live per-connection outbound channel and
//! forwards a formatted `ServerFrame`.

use async_trait::async_trait;

use conduit_protocol::ws::ServerFrame;
use conduit_router::{DeliveryError, WebSender};

use crate::app::WsClients;

pub struct WebSenderImpl {
    ws_clients: WsClients,
}

impl WebSenderImpl {
    pub fn new(ws_clients: WsClients) -> Self {
        Self { ws_clients }
    }
}

#[async_trait]
impl WebSender for WebSenderImpl {
    async fn send_frame(&self, connection_id: &str, content: &str) -> Result<(), DeliveryError> {
        let sender = self
            .ws_clients
            .get(connection_id)
            .ok_or_else(|| DeliveryError::ConnectionGone(connection_id.to_string()))?;
        sender
            .send(ServerFrame::message(content))
            .map_err(|_| DeliveryError::ConnectionGone(connection_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn send_frame_reaches_registered_client() {
        let clients: WsClients = Arc::new(DashMap::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        clients.insert("conn-1".to_string(), tx);
        let sender = WebSenderImpl::new(clients);

        sender.send_frame("conn-1", "hi").await.unwrap();
        let frame = rx.recv().await.unwrap();
        match frame {
            ServerFrame::Message { content, .. } => assert_eq!(content, "hi"),
            _ => panic!("expected a message frame"),
        }
    }

    #[tokio::test]
    async fn send_frame_to_missing_client_is_connection_gone() {
        let clients: WsClients = Arc::new(DashMap::new());
        let sender = WebSenderImpl::new(clients);
        let err = sender.send_frame("ghost", "hi").await.unwrap_err();
        assert!(matches!(err, DeliveryError::ConnectionGone(_)));
    }
}
