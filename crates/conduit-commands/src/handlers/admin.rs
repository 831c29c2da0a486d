//! `/admin <subcommand>` — the administrative control plane (§4.1, §4.5).
//! Permission `ADMIN` is enforced by wrapping this handler in a
//! [`crate::permission_gate::PermissionGate`]; self-lockout is enforced here.

use conduit_core::error::{ConduitError, Result};
use conduit_identity::permissions::refuses_self_target;
use conduit_identity::allowlist;
use conduit_identity::types::{AllowlistEntry, WebRole};

use crate::context::CommandContext;
use crate::handler::{CommandHandler, HandlerOutcome};

pub struct AdminCommandHandler;

const HELP_TEXT: &str = "\
/admin add <chat_id> [username]  - allowlist a chat
/admin remove <chat_id>          - remove a chat from the allowlist
/admin list                      - list all allowlisted chats
/admin info <chat_id>            - show one entry's details
/admin enable <chat_id>          - re-enable a disabled entry
/admin disable <chat_id>         - disable an entry
/admin promote <chat_id>         - grant admin role
/admin demote <chat_id>          - revoke admin role
/admin stats                     - allowlist counts
/admin broadcast <message>       - message every enabled chat
/admin help                      - this message";

fn parse_chat_id(arg: &str) -> Result<i64> {
    arg.trim()
        .parse::<i64>()
        .map_err(|_| ConduitError::InvalidInput(format!("'{arg}' is not a valid chat id")))
}

fn fmt_entry(e: &AllowlistEntry) -> String {
    format!(
        "chat_id={} username={} enabled={} role={}",
        e.chat_id,
        e.username.as_deref().unwrap_or("-"),
        e.enabled,
        e.role.as_str()
    )
}

impl CommandHandler for AdminCommandHandler {
    fn can_handle(&self, text: &str) -> bool {
        let stripped = text.trim();
        stripped == "/admin" || stripped.starts_with("/admin ")
    }

    fn handle(&self, ctx: &CommandContext<'_>) -> Result<HandlerOutcome> {
        let args = ctx.args();
        let mut parts = args.splitn(2, char::is_whitespace);
        let subcommand = parts.next().unwrap_or("").to_lowercase();
        let rest = parts.next().unwrap_or("").trim();

        let conn = ctx.identity_conn;

        match subcommand.as_str() {
            "" | "help" => Ok(HandlerOutcome::new(HELP_TEXT)),

            "add" => {
                let mut it = rest.splitn(2, char::is_whitespace);
                let chat_id = parse_chat_id(it.next().unwrap_or(""))?;
                let username = it.next().map(str::trim).filter(|s| !s.is_empty());
                allowlist::add(conn, chat_id, username)?;
                Ok(HandlerOutcome::new(format!("Added chat {chat_id} to the allowlist.")))
            }

            "remove" => {
                let chat_id = parse_chat_id(rest)?;
                if refuses_self_target(ctx.chat_id, chat_id) {
                    return Ok(HandlerOutcome::new("You cannot remove yourself from the allowlist."));
                }
                allowlist::remove(conn, chat_id)?;
                Ok(HandlerOutcome::new(format!("Removed chat {chat_id}.")))
            }

            "list" => {
                let entries = allowlist::list_all(conn)?;
                if entries.is_empty() {
                    return Ok(HandlerOutcome::new("Allowlist is empty."));
                }
                let body = entries.iter().map(fmt_entry).collect::<Vec<_>>().join("\n");
                Ok(HandlerOutcome::new(body))
            }

            "info" => {
                let chat_id = parse_chat_id(rest)?;
                match allowlist::get(conn, chat_id)? {
                    Some(e) => Ok(HandlerOutcome::new(fmt_entry(&e))),
                    None => Ok(HandlerOutcome::new(format!("No allowlist entry for chat {chat_id}."))),
                }
            }

            "enable" => {
                let chat_id = parse_chat_id(rest)?;
                allowlist::set_enabled(conn, chat_id, true)?;
                Ok(HandlerOutcome::new(format!("Enabled chat {chat_id}.")))
            }

            "disable" => {
                let chat_id = parse_chat_id(rest)?;
                if refuses_self_target(ctx.chat_id, chat_id) {
                    return Ok(HandlerOutcome::new("You cannot disable yourself."));
                }
                allowlist::set_enabled(conn, chat_id, false)?;
                Ok(HandlerOutcome::new(format!("Disabled chat {chat_id}.")))
            }

            "promote" => {
                let chat_id = parse_chat_id(rest)?;
                allowlist::set_role(conn, chat_id, WebRole::Admin)?;
                Ok(HandlerOutcome::new(format!("Promoted chat {chat_id} to admin.")))
            }

            "demote" => {
                let chat_id = parse_chat_id(rest)?;
                if refuses_self_target(ctx.chat_id, chat_id) {
                    return Ok(HandlerOutcome::new("You cannot demote yourself."));
                }
                allowlist::set_role(conn, chat_id, WebRole::User)?;
                Ok(HandlerOutcome::new(format!("Demoted chat {chat_id} to user.")))
            }

            "stats" => {
                let all = allowlist::list_all(conn)?;
                let enabled = all.iter().filter(|e| e.enabled).count();
                let admins = all.iter().filter(|e| e.role.is_admin()).count();
                Ok(HandlerOutcome::new(format!(
                    "Allowlist: {} total, {} enabled, {} admin",
                    all.len(),
                    enabled,
                    admins
                )))
            }

            "broadcast" => {
                if rest.is_empty() {
                    return Ok(HandlerOutcome::new("Usage: /admin broadcast <message>"));
                }
                let recipients: Vec<i64> = allowlist::list_enabled(conn)?
                    .into_iter()
                    .map(|e| e.chat_id)
                    .filter(|&chat_id| chat_id != ctx.chat_id)
                    .collect();
                let count = recipients.len();
                let fanout = recipients.into_iter().map(|chat_id| (chat_id, rest.to_string())).collect();
                Ok(HandlerOutcome::with_fanout(
                    format!("Broadcasting to {count} recipient(s)."),
                    fanout,
                ))
            }

            other => Ok(HandlerOutcome::new(format!(
                "Unknown subcommand '{other}'. {HELP_TEXT}"
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "AdminCommand"
    }

    fn description(&self) -> &'static str {
        "administers the allowlist, roles, and broadcasts (requires admin)"
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

    fn deployment() -> crate::deployment::StaticDeploymentInfo {
        crate::deployment::StaticDeploymentInfo {
            descriptor: crate::deployment::DeploymentDescriptor { stack_name: "x".into(), status: "x".into(), last_updated: "x".into() },
        }
    }

    #[test]
    fn add_list_remove_round_trip() {
        let identity = open_identity();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let d = deployment();

        let c = ctx(&identity, &history, "/admin add 100 steven", 1, &d);
        let out = AdminCommandHandler.handle(&c).unwrap();
        assert!(out.reply.contains("Added"));

        let c = ctx(&identity, &history, "/admin list", 1, &d);
        let out = AdminCommandHandler.handle(&c).unwrap();
        assert!(out.reply.contains("chat_id=100"));

        let c = ctx(&identity, &history, "/admin remove 100", 1, &d);
        let out = AdminCommandHandler.handle(&c).unwrap();
        assert!(out.reply.contains("Removed"));
    }

    #[test]
    fn self_targeting_remove_disable_demote_refused() {
        let identity = open_identity();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let d = deployment();
        allowlist::add(&identity, 1, None).unwrap();

        for sub in ["remove", "disable", "demote"] {
            let c = ctx(&identity, &history, &format!("/admin {sub} 1"), 1, &d);
            let out = AdminCommandHandler.handle(&c).unwrap();
            assert!(out.reply.to_lowercase().contains("cannot"), "subcommand {sub} should refuse self-target");
        }
    }

    #[test]
    fn broadcast_excludes_sender_and_fans_out() {
        let identity = open_identity();
        let history = rusqlite::Connection::open_in_memory().unwrap();
        let d = deployment();
        allowlist::add(&identity, 1, None).unwrap();
        allowlist::add(&identity, 2, None).unwrap();
        allowlist::add(&identity, 3, None).unwrap();
        allowlist::set_enabled(&identity, 3, false).unwrap();

        let c = ctx(&identity, &history, "/admin broadcast hello everyone", 1, &d);
        let out = AdminCommandHandler.handle(&c).unwrap();
        assert_eq!(out.fanout.len(), 1);
        assert_eq!(out.fanout[0].0, 2);
        assert_eq!(out.fanout[0].1, "hello everyone");
    }
}
