use conduit_core::error::Result;

use crate::context::CommandContext;

/// A single command handler (§4.5): decides whether it owns a piece of text,
/// then produces the reply to send back on the originating channel.
pub trait CommandHandler: Send + Sync {
    fn can_handle(&self, text: &str) -> bool;

    fn handle(&self, ctx: &CommandContext<'_>) -> Result<HandlerOutcome>;

    /// Used in logs and in `/admin help`-style listings.
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str {
        ""
    }
}

#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    /// Sent back to the chat that issued the command.
    pub reply: String,
    /// Additional `(chat_id, text)` deliveries, e.g. `/admin broadcast`'s
    /// fan-out to every allowlisted chat. Delivered by the ingress adapter,
    /// which owns the provider client — the command router never sends
    /// network traffic itself.
    pub fanout: Vec<(i64, String)>,
}

impl HandlerOutcome {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), fanout: Vec::new() }
    }

    pub fn with_fanout(reply: impl Into<String>, fanout: Vec<(i64, String)>) -> Self {
        Self { reply: reply.into(), fanout }
    }
}
