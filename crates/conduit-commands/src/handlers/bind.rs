//! `/bind <code>` — redeems a binding code issued by `POST
//! /binding/generate-code` (§4.1 step 2).

use conduit_core::error::Result;
use conduit_identity::binding::redeem_code;
use conduit_identity::error::IdentityError;

use crate::context::CommandContext;
use crate::handler::{CommandHandler, HandlerOutcome};

pub struct BindCommandHandler;

fn is_six_digits(s: &str) -> bool {
    s.len() == 6 && s.chars().all(|c| c.is_ascii_digit())
}

impl CommandHandler for BindCommandHandler {
    fn can_handle(&self, text: &str) -> bool {
        let stripped = text.trim();
        stripped == "/bind" || stripped.starts_with("/bind ")
    }

    fn handle(&self, ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
        let code = ctx.args();
        if !is_six_digits(code) {
            return Ok(HandlerOutcome::new(
                "Usage: /bind <6-digit code> (generate one from the web app first)",
            ));
        }

        match redeem_code(ctx.identity_conn, code, ctx.chat_id) {
            Ok(_unified_user_id) => Ok(HandlerOutcome::new(
                "Account linked! Your Telegram chat is now bound to your web account.",
            )),
            Err(IdentityError::BindingCodeInvalid) => {
                Ok(HandlerOutcome::new("That code is invalid or expired."))
            }
            Err(IdentityError::AlreadyBound) => Ok(HandlerOutcome::new(
                "This chat (or account) is already bound to a web account.",
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn name(&self) -> &'static str {
        "BindCommand"
    }

    fn description(&self) -> &'static str {
        "links this Telegram chat to a web account via a one-time code"
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

    fn ctx<'a>(identity: &'a rusqlite::Connection, history: &'a rusqlite::Connection, text: &str, chat_id: i64, deployment: &'a dyn crate::deployment::DeploymentInfoProvider) -> CommandContext<'a> {
        CommandContext {
            identity_conn: identity,
            history_conn: history,
            chat_id,
            username: None,
            text: text.to_string(),
            raw_event: serde_json::json!({}),
            deployment,
        }
    }

    #[test]
    fn rejects_non_six_digit_input() {
        let identity = open_identity();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let deployment = crate::deployment::StaticDeploymentInfo {
            descriptor: crate::deployment::DeploymentDescriptor { stack_name: "x".into(), status: "x".into(), last_updated: "x".into() },
        };
        let c = ctx(&identity, &history, "/bind abc", 1, &deployment);
        let outcome = BindCommandHandler.handle(&c).unwrap();
        assert!(outcome.reply.starts_with("Usage:"));
    }

    #[test]
    fn binds_with_valid_code_and_rejects_reuse() {
        let identity = open_identity();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let deployment = crate::deployment::StaticDeploymentInfo {
            descriptor: crate::deployment::DeploymentDescriptor { stack_name: "x".into(), status: "x".into(), last_updated: "x".into() },
        };
        let code = conduit_identity::binding::generate_code(&identity, "alice@example.com").unwrap();

        let c = ctx(&identity, &history, &format!("/bind {}", code.code), 999, &deployment);
        let outcome = BindCommandHandler.handle(&c).unwrap();
        assert!(outcome.reply.contains("linked"));

        let c2 = ctx(&identity, &history, &format!("/bind {}", code.code), 1000, &deployment);
        let outcome2 = BindCommandHandler.handle(&c2).unwrap();
        assert!(outcome2.reply.contains("invalid or expired"));
    }
}
