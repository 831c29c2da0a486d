//! Telegram allowlist (§4.1, §4.4.1). Permit-by-default-deny roster keyed
//! by chat id. A disabled entry is equivalent to an absent one.

use rusqlite::{params, OptionalExtension};
use tracing::{info, instrument};

use crate::error::{IdentityError, Result};
use crate::types::{AllowlistEntry, WebRole};

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<AllowlistEntry> {
    let role: String = row.get(3)?;
    let enabled: i64 = row.get(2)?;
    let perms: String = row.get(4)?;
    Ok(AllowlistEntry {
        chat_id: row.get(0)?,
        username: row.get(1)?,
        enabled: enabled != 0,
        role: role.parse().unwrap_or_default(),
        permissions: serde_json::from_str(&perms).unwrap_or(serde_json::json!({})),
    })
}

const SELECT_SQL: &str =
    "SELECT chat_id, username, enabled, role, permissions FROM allowlist";

pub fn get(conn: &rusqlite::Connection, chat_id: i64) -> Result<Option<AllowlistEntry>> {
    let sql = format!("{SELECT_SQL} WHERE chat_id = ?1");
    conn.query_row(&sql, params![chat_id], row_to_entry)
        .optional()
        .map_err(IdentityError::from)
}

/// Admission check for the Telegram ingress path (§4.4.1): an absent or
/// disabled entry denies.
pub fn is_allowed(conn: &rusqlite::Connection, chat_id: i64) -> Result<bool> {
    Ok(get(conn, chat_id)?.map(|e| e.enabled).unwrap_or(false))
}

pub fn list_enabled(conn: &rusqlite::Connection) -> Result<Vec<AllowlistEntry>> {
    let sql = format!("{SELECT_SQL} WHERE enabled = 1");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_entry)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn list_all(conn: &rusqlite::Connection) -> Result<Vec<AllowlistEntry>> {
    let mut stmt = conn.prepare(SELECT_SQL)?;
    let rows = stmt.query_map([], row_to_entry)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

#[instrument(skip(conn))]
pub fn add(conn: &rusqlite::Connection, chat_id: i64, username: Option<&str>) -> Result<()> {
    conn.execute(
        "INSERT INTO allowlist (chat_id, username, enabled, role, permissions)
         VALUES (?1, ?2, 1, 'user', '{}')
         ON CONFLICT(chat_id) DO UPDATE SET username = excluded.username, enabled = 1",
        params![chat_id, username],
    )?;
    info!(chat_id, "added to allowlist");
    Ok(())
}

pub fn remove(conn: &rusqlite::Connection, chat_id: i64) -> Result<()> {
    conn.execute("DELETE FROM allowlist WHERE chat_id = ?1", params![chat_id])?;
    Ok(())
}

pub fn set_enabled(conn: &rusqlite::Connection, chat_id: i64, enabled: bool) -> Result<()> {
    let rows = conn.execute(
        "UPDATE allowlist SET enabled = ?1 WHERE chat_id = ?2",
        params![enabled as i64, chat_id],
    )?;
    if rows == 0 {
        return Err(IdentityError::NotFound(chat_id.to_string()));
    }
    Ok(())
}

pub fn set_role(conn: &rusqlite::Connection, chat_id: i64, role: WebRole) -> Result<()> {
    let rows = conn.execute(
        "UPDATE allowlist SET role = ?1 WHERE chat_id = ?2",
        params![role.as_str(), chat_id],
    )?;
    if rows == 0 {
        return Err(IdentityError::NotFound(chat_id.to_string()));
    }
    Ok(())
}

pub fn set_permission(conn: &rusqlite::Connection, chat_id: i64, key: &str, value: bool) -> Result<()> {
    let entry = get(conn, chat_id)?.ok_or_else(|| IdentityError::NotFound(chat_id.to_string()))?;
    let mut perms = entry.permissions;
    perms[key] = serde_json::Value::Bool(value);
    conn.execute(
        "UPDATE allowlist SET permissions = ?1 WHERE chat_id = ?2",
        params![perms.to_string(), chat_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    #[test]
    fn absent_entry_denies() {
        let conn = open_test_db();
        assert!(!is_allowed(&conn, 1).unwrap());
    }

    #[test]
    fn disabled_entry_denies() {
        let conn = open_test_db();
        add(&conn, 1, Some("steven")).unwrap();
        set_enabled(&conn, 1, false).unwrap();
        assert!(!is_allowed(&conn, 1).unwrap());
    }

    #[test]
    fn enabled_entry_allows() {
        let conn = open_test_db();
        add(&conn, 1, Some("steven")).unwrap();
        assert!(is_allowed(&conn, 1).unwrap());
    }

    #[test]
    fn permission_flags_round_trip() {
        let conn = open_test_db();
        add(&conn, 1, None).unwrap();
        set_permission(&conn, 1, "file_reader", true).unwrap();
        let entry = get(&conn, 1).unwrap().unwrap();
        assert!(entry.has_permission("file_reader"));
        assert!(!entry.has_permission("other"));
    }
}
