//! `/info` — renders the deployment descriptor (§4.5). Errors from the
//! descriptor provider map to human-readable messages rather than the raw
//! failure (§7 propagation policy).

use conduit_core::error::{ConduitError, Result};

use crate::context::CommandContext;
use crate::handler::{CommandHandler, HandlerOutcome};

pub struct InfoCommandHandler;

impl CommandHandler for InfoCommandHandler {
    fn can_handle(&self, text: &str) -> bool {
        text.trim().starts_with("/info")
    }

    fn handle(&self, ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
        let reply = match ctx.deployment.describe() {
            Ok(d) => format!(
                "Deployment info\n\nStack: {}\nStatus: {}\nLast updated: {}",
                d.stack_name, d.status, d.last_updated
            ),
            Err(ConduitError::Forbidden(_)) => {
                "Unable to fetch deployment info: access denied".to_string()
            }
            Err(ConduitError::NotFound(_)) => {
                "Unable to fetch deployment info: stack not found".to_string()
            }
            Err(e) => format!("Unable to fetch deployment info: {}", e.user_message()),
        };
        Ok(HandlerOutcome::new(reply))
    }

    fn name(&self) -> &'static str {
        "InfoCommand"
    }

    fn description(&self) -> &'static str {
        "shows deployment stack name, status, and last-updated time"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deployment::{DeploymentDescriptor, DeploymentInfoProvider, StaticDeploymentInfo};

    struct FailingDeployment;
    impl DeploymentInfoProvider for FailingDeployment {
        fn describe(&self) -> Result<DeploymentDescriptor> {
            Err(ConduitError::NotFound("stack".into()))
        }
    }

    #[test]
    fn renders_descriptor_fields() {
        let identity = rusqlite::Connection::open_in_memory().unwrap();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let deployment = StaticDeploymentInfo {
            descriptor: DeploymentDescriptor {
                stack_name: "conduit-prod".into(),
                status: "UPDATE_COMPLETE".into(),
                last_updated: "2026-01-01T00:00:00Z".into(),
            },
        };
        let ctx = CommandContext {
            identity_conn: &identity,
            history_conn: &history,
            chat_id: 1,
            username: None,
            text: "/info".into(),
            raw_event: serde_json::json!({}),
            deployment: &deployment,
        };
        let outcome = InfoCommandHandler.handle(&ctx).unwrap();
        assert!(outcome.reply.contains("conduit-prod"));
        assert!(outcome.reply.contains("UPDATE_COMPLETE"));
    }

    #[test]
    fn maps_not_found_to_friendly_message() {
        let identity = rusqlite::Connection::open_in_memory().unwrap();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let deployment = FailingDeployment;
        let ctx = CommandContext {
            identity_conn: &identity,
            history_conn: &history,
            chat_id: 1,
            username: None,
            text: "/info".into(),
            raw_event: serde_json::json!({}),
            deployment: &deployment,
        };
        let outcome = InfoCommandHandler.handle(&ctx).unwrap();
        assert!(outcome.reply.contains("stack not found"));
    }
}
