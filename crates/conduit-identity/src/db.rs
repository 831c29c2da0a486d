use rusqlite::Connection;

use crate::error::Result;

/// Idempotent schema init — safe to call on every process start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS unified_users (
            unified_user_id   TEXT PRIMARY KEY,
            web_email         TEXT UNIQUE,
            telegram_chat_id  INTEGER UNIQUE,
            binding_status    TEXT NOT NULL,
            created_at        TEXT NOT NULL,
            updated_at        TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_unified_users_email ON unified_users(web_email);
        CREATE INDEX IF NOT EXISTS idx_unified_users_tg ON unified_users(telegram_chat_id);

        CREATE TABLE IF NOT EXISTS web_users (
            email                    TEXT PRIMARY KEY,
            password_hash            TEXT NOT NULL,
            enabled                  INTEGER NOT NULL DEFAULT 1,
            role                     TEXT NOT NULL DEFAULT 'user',
            require_password_change INTEGER NOT NULL DEFAULT 0,
            created_at               TEXT NOT NULL,
            last_login                TEXT
        );

        CREATE TABLE IF NOT EXISTS binding_codes (
            code       TEXT PRIMARY KEY,
            web_email  TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            status     TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_binding_codes_email ON binding_codes(web_email, status);

        CREATE TABLE IF NOT EXISTS allowlist (
            chat_id     INTEGER PRIMARY KEY,
            username    TEXT,
            enabled     INTEGER NOT NULL DEFAULT 1,
            role        TEXT NOT NULL DEFAULT 'user',
            permissions TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE IF NOT EXISTS failed_logins (
            email      TEXT NOT NULL,
            attempted_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_failed_logins_email ON failed_logins(email, attempted_at);
        ",
    )?;
    Ok(())
}

#[cfg(test)]
pub fn open_test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_db(&conn).unwrap();
    conn
}
