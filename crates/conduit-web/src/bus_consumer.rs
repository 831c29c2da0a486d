//! Feeds the Response Router from the dispatch fabric (§4.6, §4.7). Only
//! meaningful when `bus` is configured as `nats` — `BusClient` itself is
//! publish-only, so completion/failure events need a dedicated subscriber
//! talking to the NATS client directly.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::{error, info, warn};

use conduit_bus::idempotency::{IdempotencyKey, SeenSet};
use conduit_bus::subjects::{DETAIL_TYPE_COMPLETED, DETAIL_TYPE_FAILED};
use conduit_protocol::events::{MessageCompletedDetail, MessageFailedDetail};
use conduit_router::ResponseRouter;

const SEEN_SET_TTL: Duration = Duration::from_secs(600);

/// Runs until the connection drops; the caller is expected to `tokio::spawn`
/// this and let it live for the process lifetime.
pub async fn run(nats_url: String, router: Arc<ResponseRouter>) {
    let client = match async_nats::connect(&nats_url).await {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "bus consumer failed to connect to nats, completion events will not be delivered");
            return;
        }
    };

    let seen = Arc::new(SeenSet::new(SEEN_SET_TTL));

    let completed_router = router.clone();
    let completed_seen = seen.clone();
    let completed_client = client.clone();
    let completed = tokio::spawn(async move {
        consume_completed(completed_client, completed_router, completed_seen).await;
    });

    let failed_router = router;
    let failed_seen = seen;
    let failed = tokio::spawn(async move {
        consume_failed(client, failed_router, failed_seen).await;
    });

    let _ = tokio::join!(completed, failed);
}

async fn consume_completed(client: async_nats::Client, router: Arc<ResponseRouter>, seen: Arc<SeenSet>) {
    let mut subscriber = match client.subscribe(DETAIL_TYPE_COMPLETED.to_string()).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, subject = DETAIL_TYPE_COMPLETED, "subscribe failed");
            return;
        }
    };
    info!(subject = DETAIL_TYPE_COMPLETED, "bus consumer subscribed");

    while let Some(message) = subscriber.next().await {
        let detail: MessageCompletedDetail = match serde_json::from_slice(&message.payload) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "dropping malformed message.completed event");
                continue;
            }
        };
        if seen.seen_or_insert(&IdempotencyKey::for_message(&detail.message_id)) {
            continue;
        }
        if let Err(failure) = router.route_completed(detail).await {
            warn!(error = %failure.error, message_id = ?failure.message_id, "failed to route completed message");
        }
    }
}

async fn consume_failed(client: async_nats::Client, router: Arc<ResponseRouter>, seen: Arc<SeenSet>) {
    let mut subscriber = match client.subscribe(DETAIL_TYPE_FAILED.to_string()).await {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, subject = DETAIL_TYPE_FAILED, "subscribe failed");
            return;
        }
    };
    info!(subject = DETAIL_TYPE_FAILED, "bus consumer subscribed");

    while let Some(message) = subscriber.next().await {
        let detail: MessageFailedDetail = match serde_json::from_slice(&message.payload) {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "dropping malformed message.failed event");
                continue;
            }
        };
        if seen.seen_or_insert(&IdempotencyKey::for_message(&detail.message_id)) {
            continue;
        }
        if let Err(failure) = router.route_failed(detail).await {
            warn!(error = %failure.error, message_id = ?failure.message_id, "failed to route failed message");
        }
    }
}
