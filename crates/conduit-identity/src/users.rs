//! UnifiedUser and WebUser persistence (§3, §4.1).

use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use conduit_core::time::now_rfc3339;

use crate::error::{IdentityError, Result};
use crate::types::{BindingStatus, UnifiedUser, WebRole, WebUser};

const UNIFIED_USER_SELECT_SQL: &str = "SELECT unified_user_id, web_email, telegram_chat_id, \
     binding_status, created_at, updated_at FROM unified_users";

fn row_to_unified_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnifiedUser> {
    let status: String = row.get(3)?;
    Ok(UnifiedUser {
        unified_user_id: row.get(0)?,
        web_email: row.get(1)?,
        telegram_chat_id: row.get(2)?,
        binding_status: status.parse().unwrap_or(BindingStatus::WebOnly),
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Creates a fresh UnifiedUser seeded by a web email (`binding_status=web_only`)
/// or a Telegram chat id (`binding_status=telegram_only`), never both —
/// callers that already have both should go through the binding protocol.
#[instrument(skip(conn))]
pub fn create_unified_user(
    conn: &rusqlite::Connection,
    web_email: Option<&str>,
    telegram_chat_id: Option<i64>,
) -> Result<UnifiedUser> {
    let status = match (web_email, telegram_chat_id) {
        (Some(_), None) => BindingStatus::WebOnly,
        (None, Some(_)) => BindingStatus::TelegramOnly,
        (Some(_), Some(_)) => BindingStatus::Complete,
        (None, None) => {
            return Err(IdentityError::InvalidInput(
                "unified user requires at least one identity".into(),
            ))
        }
    };
    let id = Uuid::now_v7().to_string();
    let now = now_rfc3339();

    conn.execute(
        "INSERT INTO unified_users (unified_user_id, web_email, telegram_chat_id, binding_status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![id, web_email, telegram_chat_id, status.as_str(), now],
    )?;

    info!(unified_user_id = %id, "created unified user");
    Ok(UnifiedUser {
        unified_user_id: id,
        web_email: web_email.map(String::from),
        telegram_chat_id,
        binding_status: status,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn get_by_id(conn: &rusqlite::Connection, id: &str) -> Result<Option<UnifiedUser>> {
    let sql = format!("{UNIFIED_USER_SELECT_SQL} WHERE unified_user_id = ?1");
    conn.query_row(&sql, params![id], row_to_unified_user)
        .optional()
        .map_err(IdentityError::from)
}

pub fn get_by_email(conn: &rusqlite::Connection, email: &str) -> Result<Option<UnifiedUser>> {
    let sql = format!("{UNIFIED_USER_SELECT_SQL} WHERE web_email = ?1");
    conn.query_row(&sql, params![email], row_to_unified_user)
        .optional()
        .map_err(IdentityError::from)
}

pub fn get_by_telegram_chat_id(
    conn: &rusqlite::Connection,
    chat_id: i64,
) -> Result<Option<UnifiedUser>> {
    let sql = format!("{UNIFIED_USER_SELECT_SQL} WHERE telegram_chat_id = ?1");
    conn.query_row(&sql, params![chat_id], row_to_unified_user)
        .optional()
        .map_err(IdentityError::from)
}

/// Resolves (or mints) the unified user for a web email — used by `$connect`
/// and `generate_code` (§4.1, §4.3).
pub fn resolve_or_create_by_email(
    conn: &rusqlite::Connection,
    email: &str,
) -> Result<UnifiedUser> {
    if let Some(existing) = get_by_email(conn, email)? {
        return Ok(existing);
    }
    create_unified_user(conn, Some(email), None)
}

/// Resolves (or mints) the unified user for a Telegram chat id — used by the
/// Telegram ingress path and by `/new` for users who have never bound a web
/// account (§4.4.1 normalization step).
pub fn resolve_or_create_by_telegram_chat_id(
    conn: &rusqlite::Connection,
    telegram_chat_id: i64,
) -> Result<UnifiedUser> {
    if let Some(existing) = get_by_telegram_chat_id(conn, telegram_chat_id)? {
        return Ok(existing);
    }
    create_unified_user(conn, None, Some(telegram_chat_id))
}

/// Atomically binds a Telegram chat id onto a UnifiedUser, only if the row's
/// `telegram_chat_id` is currently null. Returns `Ok(false)` if the
/// conditional write lost the race (another bind beat us to it) so the
/// caller can surface a user-visible error instead of silently retrying
/// (§4.1 step (e) + §5 "Contention points").
#[instrument(skip(conn))]
pub fn conditionally_bind_telegram(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    telegram_chat_id: i64,
) -> Result<bool> {
    let now = now_rfc3339();
    let rows = conn.execute(
        "UPDATE unified_users
         SET telegram_chat_id = ?1, binding_status = 'complete', updated_at = ?2
         WHERE unified_user_id = ?3 AND telegram_chat_id IS NULL",
        params![telegram_chat_id, now, unified_user_id],
    )?;
    debug!(unified_user_id, telegram_chat_id, rows, "conditional bind attempt");
    Ok(rows == 1)
}

// ── WebUser ──────────────────────────────────────────────────────────────

fn row_to_web_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<WebUser> {
    let role: String = row.get(2)?;
    let enabled: i64 = row.get(1)?;
    let require_change: i64 = row.get(4)?;
    Ok(WebUser {
        email: row.get(0)?,
        password_hash: row.get(5)?,
        enabled: enabled != 0,
        role: role.parse().unwrap_or_default(),
        require_password_change: require_change != 0,
        created_at: row.get(6)?,
        last_login: row.get(7)?,
    })
}

const WEB_USER_SELECT_SQL: &str =
    "SELECT email, enabled, role, NULL, require_password_change, password_hash, created_at, last_login FROM web_users";

pub fn get_web_user(conn: &rusqlite::Connection, email: &str) -> Result<Option<WebUser>> {
    let sql = format!("{WEB_USER_SELECT_SQL} WHERE email = ?1");
    conn.query_row(&sql, params![email], row_to_web_user)
        .optional()
        .map_err(IdentityError::from)
}

pub fn create_web_user(
    conn: &rusqlite::Connection,
    email: &str,
    password_hash: &str,
    role: WebRole,
) -> Result<WebUser> {
    if get_web_user(conn, email)?.is_some() {
        return Err(IdentityError::Conflict(format!("{email} already registered")));
    }
    let now = now_rfc3339();
    conn.execute(
        "INSERT INTO web_users (email, password_hash, enabled, role, require_password_change, created_at)
         VALUES (?1, ?2, 1, ?3, 0, ?4)",
        params![email, password_hash, role.as_str(), now],
    )?;
    Ok(WebUser {
        email: email.to_string(),
        password_hash: password_hash.to_string(),
        enabled: true,
        role,
        require_password_change: false,
        created_at: now,
        last_login: None,
    })
}

pub fn set_password_hash(conn: &rusqlite::Connection, email: &str, hash: &str) -> Result<()> {
    conn.execute(
        "UPDATE web_users SET password_hash = ?1, require_password_change = 0 WHERE email = ?2",
        params![hash, email],
    )?;
    Ok(())
}

pub fn touch_last_login(conn: &rusqlite::Connection, email: &str) -> Result<()> {
    conn.execute(
        "UPDATE web_users SET last_login = ?1 WHERE email = ?2",
        params![now_rfc3339(), email],
    )?;
    Ok(())
}

pub fn set_role(conn: &rusqlite::Connection, email: &str, role: WebRole) -> Result<()> {
    let rows = conn.execute(
        "UPDATE web_users SET role = ?1 WHERE email = ?2",
        params![role.as_str(), email],
    )?;
    if rows == 0 {
        return Err(IdentityError::NotFound(email.to_string()));
    }
    Ok(())
}

/// Full roster for the admin `GET /admin/users` surface, ordered by
/// creation time.
pub fn list_web_users(conn: &rusqlite::Connection) -> Result<Vec<WebUser>> {
    let sql = format!("{WEB_USER_SELECT_SQL} ORDER BY created_at ASC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_web_user)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(IdentityError::from)
}

/// UnifiedUsers with a completed web/Telegram pairing, for the admin
/// `GET /admin/bindings` surface.
pub fn list_bound(conn: &rusqlite::Connection) -> Result<Vec<UnifiedUser>> {
    let sql = format!("{UNIFIED_USER_SELECT_SQL} WHERE binding_status = 'complete' ORDER BY updated_at DESC");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_unified_user)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(IdentityError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    #[test]
    fn create_and_bind_unified_user() {
        let conn = open_test_db();
        let user = resolve_or_create_by_email(&conn, "alice@example.com").unwrap();
        assert_eq!(user.binding_status, BindingStatus::WebOnly);

        let bound = conditionally_bind_telegram(&conn, &user.unified_user_id, 999).unwrap();
        assert!(bound);

        let reloaded = get_by_id(&conn, &user.unified_user_id).unwrap().unwrap();
        assert_eq!(reloaded.telegram_chat_id, Some(999));
        assert_eq!(reloaded.binding_status, BindingStatus::Complete);

        // Second bind attempt loses the conditional write.
        let second = conditionally_bind_telegram(&conn, &user.unified_user_id, 1000).unwrap();
        assert!(!second);
    }

    #[test]
    fn resolve_or_create_is_idempotent_by_email() {
        let conn = open_test_db();
        let a = resolve_or_create_by_email(&conn, "bob@example.com").unwrap();
        let b = resolve_or_create_by_email(&conn, "bob@example.com").unwrap();
        assert_eq!(a.unified_user_id, b.unified_user_id);
    }

    #[test]
    fn resolve_or_create_by_telegram_is_idempotent() {
        let conn = open_test_db();
        let a = resolve_or_create_by_telegram_chat_id(&conn, 555).unwrap();
        assert_eq!(a.binding_status, BindingStatus::TelegramOnly);
        let b = resolve_or_create_by_telegram_chat_id(&conn, 555).unwrap();
        assert_eq!(a.unified_user_id, b.unified_user_id);
    }

    #[test]
    fn web_user_lifecycle() {
        let conn = open_test_db();
        create_web_user(&conn, "carol@example.com", "hash", WebRole::User).unwrap();
        assert!(create_web_user(&conn, "carol@example.com", "hash", WebRole::User).is_err());

        set_role(&conn, "carol@example.com", WebRole::Admin).unwrap();
        let u = get_web_user(&conn, "carol@example.com").unwrap().unwrap();
        assert!(u.role.is_admin());
    }
}
