use rusqlite::Connection;

use crate::error::Result;

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS history_messages (
            unified_user_id  TEXT NOT NULL,
            timestamp_msgid  TEXT NOT NULL,
            role             TEXT NOT NULL,
            text             TEXT NOT NULL,
            attachments      TEXT NOT NULL DEFAULT '[]',
            channel          TEXT NOT NULL,
            conversation_id  TEXT,
            expires_at       TEXT NOT NULL,
            PRIMARY KEY (unified_user_id, timestamp_msgid)
        );
        CREATE INDEX IF NOT EXISTS idx_history_conv
            ON history_messages(unified_user_id, conversation_id, timestamp_msgid);
        CREATE INDEX IF NOT EXISTS idx_history_expiry ON history_messages(expires_at);

        CREATE TABLE IF NOT EXISTS conversations (
            unified_user_id   TEXT NOT NULL,
            conversation_id   TEXT NOT NULL,
            title             TEXT NOT NULL,
            created_at        TEXT NOT NULL,
            last_message_time TEXT NOT NULL,
            message_count     INTEGER NOT NULL DEFAULT 0,
            is_pinned         INTEGER NOT NULL DEFAULT 0,
            is_deleted        INTEGER NOT NULL DEFAULT 0,
            deleted_at        TEXT,
            PRIMARY KEY (unified_user_id, conversation_id)
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_by_time
            ON conversations(unified_user_id, is_deleted, last_message_time DESC);
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
