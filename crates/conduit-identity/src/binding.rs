//! Binding-code protocol (§4.1): a short-lived 6-digit code that ties a
//! Telegram chat to a web account.

use rand::Rng;
use rusqlite::{params, OptionalExtension};
use tracing::{info, instrument, warn};

use conduit_core::config::BINDING_CODE_TTL_SECS;
use conduit_core::time::{now_rfc3339, parse_rfc3339};

use crate::error::{IdentityError, Result};
use crate::types::{BindingCode, BindingCodeStatus};
use crate::users;

const MAX_GENERATION_ATTEMPTS: u32 = 50;

fn row_to_code(row: &rusqlite::Row<'_>) -> rusqlite::Result<BindingCode> {
    let status: String = row.get(4)?;
    Ok(BindingCode {
        code: row.get(0)?,
        web_email: row.get(1)?,
        created_at: row.get(2)?,
        expires_at: row.get(3)?,
        status: status.parse().unwrap_or(BindingCodeStatus::Expired),
    })
}

fn find_pending_for_email(conn: &rusqlite::Connection, email: &str) -> Result<Option<BindingCode>> {
    conn.query_row(
        "SELECT code, web_email, created_at, expires_at, status FROM binding_codes
         WHERE web_email = ?1 AND status = 'pending' ORDER BY created_at DESC LIMIT 1",
        params![email],
        row_to_code,
    )
    .optional()
    .map_err(IdentityError::from)
}

fn code_is_live(code: &BindingCode, now: chrono::DateTime<chrono::Utc>) -> bool {
    code.status == BindingCodeStatus::Pending
        && parse_rfc3339(&code.expires_at).map(|exp| exp > now).unwrap_or(false)
}

fn code_exists(conn: &rusqlite::Connection, code: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM binding_codes WHERE code = ?1",
        params![code],
        |r| r.get(0),
    )?;
    Ok(count > 0)
}

fn generate_unique_code(conn: &rusqlite::Connection) -> Result<String> {
    let mut rng = rand::thread_rng();
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        let candidate = format!("{:06}", rng.gen_range(0..1_000_000u32));
        if !code_exists(conn, &candidate)? {
            return Ok(candidate);
        }
    }
    Err(IdentityError::InvalidInput(
        "could not generate a unique binding code".into(),
    ))
}

/// `generate_code(email)` (§4.1 step 1). Idempotent: returns the existing
/// live code if one is pending.
#[instrument(skip(conn))]
pub fn generate_code(conn: &rusqlite::Connection, email: &str) -> Result<BindingCode> {
    let now = chrono::Utc::now();
    if let Some(existing) = find_pending_for_email(conn, email)? {
        if code_is_live(&existing, now) {
            info!(email, code = %existing.code, "returning existing pending binding code");
            return Ok(existing);
        }
    }

    let code = generate_unique_code(conn)?;
    let created_at = now_rfc3339();
    let expires_at = (now + chrono::Duration::seconds(BINDING_CODE_TTL_SECS))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);

    conn.execute(
        "INSERT INTO binding_codes (code, web_email, created_at, expires_at, status)
         VALUES (?1, ?2, ?3, ?4, 'pending')",
        params![code, email, created_at, expires_at],
    )?;

    info!(email, code = %code, "generated new binding code");
    Ok(BindingCode {
        code,
        web_email: email.to_string(),
        created_at,
        expires_at,
        status: BindingCodeStatus::Pending,
    })
}

fn load_code(conn: &rusqlite::Connection, code: &str) -> Result<BindingCode> {
    conn.query_row(
        "SELECT code, web_email, created_at, expires_at, status FROM binding_codes WHERE code = ?1",
        params![code],
        row_to_code,
    )
    .optional()?
    .ok_or(IdentityError::BindingCodeInvalid)
}

fn mark_used(conn: &rusqlite::Connection, code: &str) -> Result<()> {
    let rows = conn.execute(
        "UPDATE binding_codes SET status = 'used' WHERE code = ?1 AND status = 'pending'",
        params![code],
    )?;
    if rows == 0 {
        return Err(IdentityError::BindingCodeInvalid);
    }
    Ok(())
}

/// `/bind <code>` handler body (§4.1 step 2). Validates the code format is
/// already the caller's job (handled by the command router); this function
/// performs substeps (b) through (f).
#[instrument(skip(conn))]
pub fn redeem_code(conn: &rusqlite::Connection, code: &str, telegram_chat_id: i64) -> Result<String> {
    let record = load_code(conn, code)?;
    let now = chrono::Utc::now();

    if record.status != BindingCodeStatus::Pending {
        return Err(IdentityError::BindingCodeInvalid);
    }
    let expires_at = parse_rfc3339(&record.expires_at).ok_or(IdentityError::BindingCodeInvalid)?;
    if expires_at <= now {
        return Err(IdentityError::BindingCodeInvalid);
    }

    if users::get_by_telegram_chat_id(conn, telegram_chat_id)?.is_some() {
        warn!(telegram_chat_id, "chat already bound to a unified user");
        return Err(IdentityError::AlreadyBound);
    }

    let unified = users::resolve_or_create_by_email(conn, &record.web_email)?;

    let bound = users::conditionally_bind_telegram(conn, &unified.unified_user_id, telegram_chat_id)?;
    if !bound {
        // Lost the race against a concurrent bind on the same unified user.
        return Err(IdentityError::AlreadyBound);
    }

    mark_used(conn, code)?;
    info!(unified_user_id = %unified.unified_user_id, telegram_chat_id, "binding completed");
    Ok(unified.unified_user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    #[test]
    fn generate_code_is_idempotent_while_live() {
        let conn = open_test_db();
        let a = generate_code(&conn, "alice@example.com").unwrap();
        let b = generate_code(&conn, "alice@example.com").unwrap();
        assert_eq!(a.code, b.code);
    }

    #[test]
    fn redeem_binds_and_second_redeem_fails() {
        let conn = open_test_db();
        let code = generate_code(&conn, "alice@example.com").unwrap();

        let uid = redeem_code(&conn, &code.code, 999).unwrap();
        let user = users::get_by_id(&conn, &uid).unwrap().unwrap();
        assert_eq!(user.web_email.as_deref(), Some("alice@example.com"));
        assert_eq!(user.telegram_chat_id, Some(999));

        let second = redeem_code(&conn, &code.code, 1000);
        assert!(matches!(second, Err(IdentityError::BindingCodeInvalid)));
    }

    #[test]
    fn redeem_rejects_already_bound_chat() {
        let conn = open_test_db();
        let code1 = generate_code(&conn, "alice@example.com").unwrap();
        redeem_code(&conn, &code1.code, 999).unwrap();

        let code2 = generate_code(&conn, "dave@example.com").unwrap();
        let result = redeem_code(&conn, &code2.code, 999);
        assert!(matches!(result, Err(IdentityError::AlreadyBound)));
    }

    #[test]
    fn redeem_rejects_unknown_code() {
        let conn = open_test_db();
        let result = redeem_code(&conn, "000000", 1);
        assert!(matches!(result, Err(IdentityError::BindingCodeInvalid)));
    }
}
