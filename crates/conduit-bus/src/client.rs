//! Event-bus client abstraction (§4.6): publishes `message.received` from
//! ingress adapters and `message.completed`/`message.failed` from the
//! external processor. `InMemoryBusClient` backs local/dev/test runs;
//! `NatsBusClient` talks to a real managed bus.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus publish failed: {0}")]
    Publish(#[from] anyhow::Error),
}

impl From<BusError> for conduit_core::error::ConduitError {
    fn from(e: BusError) -> Self {
        conduit_core::error::ConduitError::DependencyError(e.to_string())
    }
}

#[async_trait]
pub trait BusClient: Send + Sync {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError>;
}

/// Serializes `payload` ahead of a `publish_value` call — kept as a free
/// function rather than a generic trait method so `BusClient` stays
/// object-safe (`Arc<dyn BusClient>`).
pub fn to_value<T: serde::Serialize>(payload: &T) -> Result<Value, BusError> {
    serde_json::to_value(payload).map_err(|e| BusError::Publish(anyhow::Error::new(e)))
}

pub struct NatsBusClient {
    client: async_nats::Client,
}

impl NatsBusClient {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Publish(anyhow::Error::new(e)))?;
        Ok(Self { client })
    }

    pub fn new(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BusClient for NatsBusClient {
    #[instrument(skip(self, payload))]
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError> {
        let bytes = serde_json::to_vec(&payload).map_err(|e| BusError::Publish(anyhow::Error::new(e)))?;
        self.client
            .publish(subject.to_string(), bytes.into())
            .await
            .map_err(|e| {
                warn!(subject, error = %e, "bus publish failed");
                BusError::Publish(anyhow::Error::new(e))
            })
    }
}

/// In-memory stand-in used for local development and tests — records every
/// published payload instead of talking to a real broker.
#[derive(Clone, Default)]
pub struct InMemoryBusClient {
    published: Arc<Mutex<Vec<(String, Value)>>>,
}

impl InMemoryBusClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn take_published(&self) -> Vec<(String, Value)> {
        let mut guard = self.published.lock().await;
        std::mem::take(&mut *guard)
    }
}

#[async_trait]
impl BusClient for InMemoryBusClient {
    async fn publish_value(&self, subject: &str, payload: Value) -> Result<(), BusError> {
        let mut guard = self.published.lock().await;
        guard.push((subject.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_client_records_publishes() {
        let client = InMemoryBusClient::new();
        client
            .publish_value("message.received", serde_json::json!({"a": 1}))
            .await
            .unwrap();
        client
            .publish_value("message.completed", serde_json::json!({"b": 2}))
            .await
            .unwrap();

        let published = client.take_published().await;
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].0, "message.received");

        assert!(client.take_published().await.is_empty(), "take_published drains the buffer");
    }
}
