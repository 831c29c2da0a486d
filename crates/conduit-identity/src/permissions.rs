//! Command permission gating (§4.5): `{NONE, ALLOWLIST, ADMIN}` levels,
//! admins automatically satisfy any lower level.

use crate::allowlist;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PermissionLevel {
    None,
    Allowlist,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionCheck {
    Allowed,
    Denied { reason: String },
}

impl PermissionCheck {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PermissionCheck::Allowed)
    }
}

/// Is `chat_id` an admin, per the allowlist's `role` column?
pub fn is_admin(conn: &rusqlite::Connection, chat_id: i64) -> Result<bool> {
    Ok(allowlist::get(conn, chat_id)?
        .map(|e| e.role.is_admin())
        .unwrap_or(false))
}

/// Evaluates whether `chat_id` may invoke a handler requiring `required`.
pub fn check(conn: &rusqlite::Connection, chat_id: i64, required: PermissionLevel) -> Result<PermissionCheck> {
    if required == PermissionLevel::None {
        return Ok(PermissionCheck::Allowed);
    }

    if is_admin(conn, chat_id)? {
        return Ok(PermissionCheck::Allowed);
    }

    match required {
        PermissionLevel::Admin => Ok(PermissionCheck::Denied {
            reason: "this command requires administrator permission".to_string(),
        }),
        PermissionLevel::Allowlist => {
            if allowlist::is_allowed(conn, chat_id)? {
                Ok(PermissionCheck::Allowed)
            } else {
                Ok(PermissionCheck::Denied {
                    reason: "you don't have permission to use this bot".to_string(),
                })
            }
        }
        PermissionLevel::None => unreachable!(),
    }
}

/// Guards against an admin locking themselves out via `/admin remove|disable|demote`
/// on their own chat id (§4.1 "self-lockout guard").
pub fn refuses_self_target(actor_chat_id: i64, target_chat_id: i64) -> bool {
    actor_chat_id == target_chat_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    #[test]
    fn admin_bypasses_allowlist_requirement() {
        let conn = open_test_db();
        crate::allowlist::add(&conn, 1, None).unwrap();
        crate::allowlist::set_role(&conn, 1, crate::types::WebRole::Admin).unwrap();

        let result = check(&conn, 1, PermissionLevel::Admin).unwrap();
        assert!(result.is_allowed());
    }

    #[test]
    fn non_allowlisted_user_denied() {
        let conn = open_test_db();
        let result = check(&conn, 42, PermissionLevel::Allowlist).unwrap();
        assert!(!result.is_allowed());
    }

    #[test]
    fn self_target_refused() {
        assert!(refuses_self_target(1, 1));
        assert!(!refuses_self_target(1, 2));
    }
}
