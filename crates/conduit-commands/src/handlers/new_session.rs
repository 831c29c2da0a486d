//! `/new` — opens a fresh conversation without touching long-term identity
//! or allowlist state (§4.5).

use conduit_core::error::Result;
use conduit_identity::users::resolve_or_create_by_telegram_chat_id;

use crate::context::CommandContext;
use crate::handler::{CommandHandler, HandlerOutcome};

pub struct NewSessionCommandHandler;

impl CommandHandler for NewSessionCommandHandler {
    fn can_handle(&self, text: &str) -> bool {
        text.trim().starts_with("/new")
    }

    fn handle(&self, ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
        let unified = resolve_or_create_by_telegram_chat_id(ctx.identity_conn, ctx.chat_id)?;
        let conversation = conduit_history::conversations::create(
            ctx.history_conn,
            &unified.unified_user_id,
            "",
        )?;

        Ok(HandlerOutcome::new(format!(
            "Started a new conversation.\n\nConversation id: {}\n\nYour long-term memory is unchanged; only this conversation's short-term context was cleared.",
            conversation.conversation_id
        )))
    }

    fn name(&self) -> &'static str {
        "NewSessionCommand"
    }

    fn description(&self) -> &'static str {
        "starts a new conversation, keeping long-term memory intact"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_identity() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conduit_identity::db::init_db(&conn).unwrap();
        conn
    }

    fn open_history() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conduit_history::db::init_db(&conn).unwrap();
        conn
    }

    #[test]
    fn creates_conversation_and_reports_id() {
        let identity = open_identity();
        let history = open_history();
        let deployment = crate::deployment::StaticDeploymentInfo {
            descriptor: crate::deployment::DeploymentDescriptor {
                stack_name: "x".into(),
                status: "x".into(),
                last_updated: "x".into(),
            },
        };
        let ctx = CommandContext {
            identity_conn: &identity,
            history_conn: &history,
            chat_id: 42,
            username: None,
            text: "/new".into(),
            raw_event: serde_json::json!({}),
            deployment: &deployment,
        };
        let outcome = NewSessionCommandHandler.handle(&ctx).unwrap();
        assert!(outcome.reply.contains("Conversation id:"));

        let unified = resolve_or_create_by_telegram_chat_id(&identity, 42).unwrap();
        let listed = conduit_history::conversations::list(&history, &unified.unified_user_id, 50, false).unwrap();
        assert_eq!(listed.recent.len(), 1);
    }
}
