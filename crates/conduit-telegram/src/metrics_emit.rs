//! Metrics specific to the Telegram ingress adapter, kept separate from
//! `conduit_router::metrics_emit` since they describe webhook parsing, not
//! response routing.

pub fn webhook_parsing_fallback() {
    metrics::counter!("WebhookParsingFallback").increment(1);
}
