//! `/debug` — echoes the redacted webhook payload (§4.5). No permission
//! requirement; open to anyone who can reach the bot.

use conduit_core::error::Result;
use conduit_core::redact::redact_paths;

use crate::context::CommandContext;
use crate::handler::{CommandHandler, HandlerOutcome};

const REDACTED_PATHS: [&[&str]; 3] = [
    &["headers", "X-Telegram-Bot-Api-Secret-Token"],
    &["multiValueHeaders", "X-Telegram-Bot-Api-Secret-Token"],
    &["requestContext", "accountId"],
];

pub struct DebugCommandHandler;

impl CommandHandler for DebugCommandHandler {
    fn can_handle(&self, text: &str) -> bool {
        let stripped = text.trim();
        stripped == "/debug" || stripped.starts_with("/debug ")
    }

    fn handle(&self, ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
        let redacted = redact_paths(&ctx.raw_event, &REDACTED_PATHS);
        let pretty = serde_json::to_string_pretty(&redacted)?;
        Ok(HandlerOutcome::new(format!("```\n{pretty}\n```")))
    }

    fn name(&self) -> &'static str {
        "DebugCommand"
    }

    fn description(&self) -> &'static str {
        "shows the redacted webhook payload for the current request"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx<'a>(identity: &'a rusqlite::Connection, history: &'a rusqlite::Connection, raw: serde_json::Value) -> CommandContext<'a> {
        CommandContext {
            identity_conn: identity,
            history_conn: history,
            chat_id: 1,
            username: None,
            text: "/debug".into(),
            raw_event: raw,
            deployment: &crate::deployment::StaticDeploymentInfo {
                descriptor: crate::deployment::DeploymentDescriptor {
                    stack_name: "x".into(),
                    status: "x".into(),
                    last_updated: "x".into(),
                },
            },
        }
    }

    #[test]
    fn redacts_secret_token_and_account_id() {
        let identity = rusqlite::Connection::open_in_memory().unwrap();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let raw = json!({
            "headers": {"X-Telegram-Bot-Api-Secret-Token": "s3cr3t"},
            "requestContext": {"accountId": "123456789012"},
        });
        let c = ctx(&identity, &history, raw);
        let outcome = DebugCommandHandler.handle(&c).unwrap();
        assert!(outcome.reply.contains("[REDACTED]"));
        assert!(!outcome.reply.contains("s3cr3t"));
        assert!(!outcome.reply.contains("123456789012"));
    }

    #[test]
    fn matches_bare_and_argumented_form() {
        assert!(DebugCommandHandler.can_handle("/debug"));
        assert!(DebugCommandHandler.can_handle("/debug extra"));
        assert!(!DebugCommandHandler.can_handle("/debugger"));
    }
}
