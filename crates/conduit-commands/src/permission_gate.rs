use conduit_core::error::Result;
use conduit_identity::permissions::{self, PermissionLevel};

use crate::context::CommandContext;
use crate::handler::{CommandHandler, HandlerOutcome};

/// Wraps a handler with a required `PermissionLevel`, per §4.5: on denial,
/// returns a user-visible refusal instead of calling the inner handler.
pub struct PermissionGate<H: CommandHandler> {
    inner: H,
    required: PermissionLevel,
}

impl<H: CommandHandler> PermissionGate<H> {
    pub fn new(inner: H, required: PermissionLevel) -> Self {
        Self { inner, required }
    }
}

impl<H: CommandHandler> CommandHandler for PermissionGate<H> {
    fn can_handle(&self, text: &str) -> bool {
        self.inner.can_handle(text)
    }

    fn handle(&self, ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
        let check = permissions::check(ctx.identity_conn, ctx.chat_id, self.required)?;
        match check {
            permissions::PermissionCheck::Allowed => self.inner.handle(ctx),
            permissions::PermissionCheck::Denied { reason } => {
                Ok(HandlerOutcome::new(format!("\u{274c} Permission denied: {reason}")))
            }
        }
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn description(&self) -> &'static str {
        self.inner.description()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn open_identity_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conduit_identity::db::init_db(&conn).unwrap();
        conn
    }

    fn open_history_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conduit_history::db::init_db(&conn).unwrap();
        conn
    }

    struct AlwaysOk;
    impl CommandHandler for AlwaysOk {
        fn can_handle(&self, text: &str) -> bool {
            text.starts_with("/secret")
        }
        fn handle(&self, _ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
            Ok(HandlerOutcome::new("granted"))
        }
        fn name(&self) -> &'static str {
            "SecretCommand"
        }
    }

    #[test]
    fn denies_non_admin_and_allows_admin() {
        let identity_conn = open_identity_db();
        let history_conn = open_history_db();
        let deployment = crate::deployment::StaticDeploymentInfo {
            descriptor: crate::deployment::DeploymentDescriptor {
                stack_name: "x".into(),
                status: "x".into(),
                last_updated: "x".into(),
            },
        };

        let gated = PermissionGate::new(AlwaysOk, PermissionLevel::Admin);
        let ctx = CommandContext {
            identity_conn: &identity_conn,
            history_conn: &history_conn,
            chat_id: 1,
            username: None,
            text: "/secret".into(),
            raw_event: serde_json::json!({}),
            deployment: &deployment,
        };
        let denied = gated.handle(&ctx).unwrap();
        assert!(denied.reply.contains("Permission denied"));

        conduit_identity::allowlist::add(&identity_conn, 1, None).unwrap();
        conduit_identity::allowlist::set_role(&identity_conn, 1, conduit_identity::types::WebRole::Admin).unwrap();
        let allowed = gated.handle(&ctx).unwrap();
        assert_eq!(allowed.reply, "granted");
    }
}
