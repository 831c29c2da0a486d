use tracing::{info, instrument, warn};

use crate::context::CommandContext;
use crate::handler::{CommandHandler, HandlerOutcome};

/// Outcome of routing a piece of text: either no handler claimed it (the
/// ingress adapter should continue to the event-bus publish step), or a
/// handler claimed it and produced a reply (§4.5 — `/admin` self-lockout
/// guards and permission denials still count as "handled").
pub enum RouteOutcome {
    NotACommand,
    Handled(HandlerOutcome),
}

/// First-match-wins registry of command handlers, in registration order.
/// Matches the teacher's read-only-after-init registry model (§5).
#[derive(Default)]
pub struct CommandRouter {
    handlers: Vec<Box<dyn CommandHandler>>,
}

impl CommandRouter {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        info!(handler = handler.name(), "registered command handler");
        self.handlers.push(handler);
    }

    #[instrument(skip(self, ctx))]
    pub fn route(&self, ctx: &CommandContext<'_>) -> RouteOutcome {
        if !ctx.text.trim_start().starts_with('/') {
            return RouteOutcome::NotACommand;
        }

        for handler in &self.handlers {
            if handler.can_handle(&ctx.text) {
                match handler.handle(ctx) {
                    Ok(outcome) => return RouteOutcome::Handled(outcome),
                    Err(e) => {
                        warn!(handler = handler.name(), error = %e, "handler error");
                        return RouteOutcome::Handled(HandlerOutcome::new(e.user_message()));
                    }
                }
            }
        }

        RouteOutcome::NotACommand
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_core::error::Result;

    struct Echo;
    impl CommandHandler for Echo {
        fn can_handle(&self, text: &str) -> bool {
            text.trim() == "/echo"
        }
        fn handle(&self, _ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
            Ok(HandlerOutcome::new("echoed"))
        }
        fn name(&self) -> &'static str {
            "EchoCommand"
        }
    }

    fn ctx<'a>(
        identity_conn: &'a rusqlite::Connection,
        history_conn: &'a rusqlite::Connection,
        deployment: &'a dyn crate::deployment::DeploymentInfoProvider,
        text: &str,
    ) -> CommandContext<'a> {
        CommandContext {
            identity_conn,
            history_conn,
            chat_id: 1,
            username: None,
            text: text.to_string(),
            raw_event: serde_json::json!({}),
            deployment,
        }
    }

    #[test]
    fn non_command_text_is_not_routed() {
        let identity_conn = rusqlite::Connection::open_in_memory().unwrap();
        let history_conn = rusqlite::Connection::open_in_memory().unwrap();
        let deployment = crate::deployment::StaticDeploymentInfo {
            descriptor: crate::deployment::DeploymentDescriptor {
                stack_name: "x".into(),
                status: "x".into(),
                last_updated: "x".into(),
            },
        };
        let router = CommandRouter::new();
        let c = ctx(&identity_conn, &history_conn, &deployment, "hello there");
        assert!(matches!(router.route(&c), RouteOutcome::NotACommand));
    }

    #[test]
    fn matching_handler_wins() {
        let identity_conn = rusqlite::Connection::open_in_memory().unwrap();
        let history_conn = rusqlite::Connection::open_in_memory().unwrap();
        let deployment = crate::deployment::StaticDeploymentInfo {
            descriptor: crate::deployment::DeploymentDescriptor {
                stack_name: "x".into(),
                status: "x".into(),
                last_updated: "x".into(),
            },
        };
        let mut router = CommandRouter::new();
        router.register(Box::new(Echo));
        let c = ctx(&identity_conn, &history_conn, &deployment, "/echo");
        match router.route(&c) {
            RouteOutcome::Handled(outcome) => assert_eq!(outcome.reply, "echoed"),
            RouteOutcome::NotACommand => panic!("expected match"),
        }
    }
}
