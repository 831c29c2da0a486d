//! HistoryMessage write/read paths (§4.2).

use rusqlite::params;
use tracing::{instrument, warn};

use conduit_core::config::HISTORY_TTL_DAYS;
use conduit_core::ids::new_timestamp_msgid;
use conduit_core::time::{bucket_for, now_rfc3339, parse_rfc3339, TimeBucket};

use crate::error::Result;
use crate::types::{BucketedHistory, HistoryMessage, Role};

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<HistoryMessage> {
    let role: String = row.get(2)?;
    let attachments: String = row.get(4)?;
    Ok(HistoryMessage {
        unified_user_id: row.get(0)?,
        timestamp_msgid: row.get(1)?,
        role: role.parse().unwrap_or(Role::User),
        text: row.get(3)?,
        attachments: serde_json::from_str(&attachments).unwrap_or_default(),
        channel: row.get(5)?,
        conversation_id: row.get(6)?,
    })
}

const SELECT_SQL: &str = "SELECT unified_user_id, timestamp_msgid, role, text, attachments, \
    channel, conversation_id FROM history_messages";

fn insert_one(conn: &rusqlite::Connection, msg: &HistoryMessage) -> Result<()> {
    let expires_at = (chrono::Utc::now() + chrono::Duration::days(HISTORY_TTL_DAYS))
        .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    conn.execute(
        "INSERT INTO history_messages
         (unified_user_id, timestamp_msgid, role, text, attachments, channel, conversation_id, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            msg.unified_user_id,
            msg.timestamp_msgid,
            msg.role.as_str(),
            msg.text,
            serde_json::to_string(&msg.attachments)?,
            msg.channel,
            msg.conversation_id,
            expires_at,
        ],
    )?;
    Ok(())
}

/// Writes exactly two HistoryMessage records (user, then assistant) sharing
/// `conversation_id`. Best-effort: callers should log and emit a metric on
/// failure without failing the user-visible reply (§4.2 "Write protocol").
#[instrument(skip(conn, user_text, assistant_text))]
pub fn write_turn(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    channel: &str,
    conversation_id: Option<&str>,
    user_text: &str,
    assistant_text: &str,
) -> Result<(HistoryMessage, HistoryMessage)> {
    let user_msg = HistoryMessage {
        unified_user_id: unified_user_id.to_string(),
        timestamp_msgid: new_timestamp_msgid(),
        role: Role::User,
        text: user_text.to_string(),
        attachments: vec![],
        channel: channel.to_string(),
        conversation_id: conversation_id.map(String::from),
    };
    insert_one(conn, &user_msg)?;

    // The assistant turn gets its own fresh timestamp_msgid so a retry never
    // collides with a previous attempt's primary key (§4.6 idempotence note).
    let assistant_msg = HistoryMessage {
        unified_user_id: unified_user_id.to_string(),
        timestamp_msgid: new_timestamp_msgid(),
        role: Role::Assistant,
        text: assistant_text.to_string(),
        attachments: vec![],
        channel: channel.to_string(),
        conversation_id: conversation_id.map(String::from),
    };
    insert_one(conn, &assistant_msg)?;

    Ok((user_msg, assistant_msg))
}

/// Best-effort wrapper: logs and swallows failures instead of propagating,
/// matching the write protocol's "failure must not fail the user-visible
/// reply" invariant.
pub fn write_turn_best_effort(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    channel: &str,
    conversation_id: Option<&str>,
    user_text: &str,
    assistant_text: &str,
) {
    if let Err(e) = write_turn(conn, unified_user_id, channel, conversation_id, user_text, assistant_text) {
        warn!(unified_user_id, error = %e, "history write failed (best-effort)");
    }
}

/// Lists messages within a conversation, oldest-first (§4.2).
pub fn list_for_conversation(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    conversation_id: &str,
) -> Result<Vec<HistoryMessage>> {
    let sql = format!(
        "{SELECT_SQL} WHERE unified_user_id = ?1 AND conversation_id = ?2 ORDER BY timestamp_msgid ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![unified_user_id, conversation_id], row_to_message)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Lists all of a user's messages, newest-first, optionally filtered by
/// channel, used by `GET /history` and the export endpoints.
pub fn list_for_user(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    channel: Option<&str>,
    limit: u32,
) -> Result<Vec<HistoryMessage>> {
    let (sql, rows_vec);
    if let Some(ch) = channel {
        let query = format!(
            "{SELECT_SQL} WHERE unified_user_id = ?1 AND channel = ?2 ORDER BY timestamp_msgid DESC LIMIT ?3"
        );
        sql = query;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![unified_user_id, ch, limit as i64], row_to_message)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        rows_vec = out;
    } else {
        let query = format!("{SELECT_SQL} WHERE unified_user_id = ?1 ORDER BY timestamp_msgid DESC LIMIT ?2");
        sql = query;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![unified_user_id, limit as i64], row_to_message)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        rows_vec = out;
    }
    Ok(rows_vec)
}

/// Buckets a user's history into `{today, yesterday, this_week, earlier}`
/// (§4.2 "Time grouping for display").
pub fn bucketed(conn: &rusqlite::Connection, unified_user_id: &str, limit: u32) -> Result<BucketedHistory> {
    let messages = list_for_user(conn, unified_user_id, None, limit)?;
    let now = chrono::Utc::now();
    let mut out = BucketedHistory {
        today: vec![],
        yesterday: vec![],
        this_week: vec![],
        earlier: vec![],
    };
    for msg in messages {
        let ts = msg
            .timestamp_msgid
            .split_once('#')
            .and_then(|(ts, _)| parse_rfc3339(ts))
            .unwrap_or(now);
        match bucket_for(ts, now) {
            TimeBucket::Today => out.today.push(msg),
            TimeBucket::Yesterday => out.yesterday.push(msg),
            TimeBucket::ThisWeek => out.this_week.push(msg),
            TimeBucket::Earlier => out.earlier.push(msg),
        }
    }
    Ok(out)
}

pub fn stats(conn: &rusqlite::Connection, unified_user_id: &str) -> Result<(u64, u64)> {
    let total: i64 = conn.query_row(
        "SELECT COUNT(*) FROM history_messages WHERE unified_user_id = ?1",
        params![unified_user_id],
        |r| r.get(0),
    )?;
    let conversations: i64 = conn.query_row(
        "SELECT COUNT(*) FROM conversations WHERE unified_user_id = ?1 AND is_deleted = 0",
        params![unified_user_id],
        |r| r.get(0),
    )?;
    Ok((total as u64, conversations as u64))
}

/// Deletes rows past their TTL. Storage backends with native TTL support
/// (e.g. DynamoDB) would do this automatically; sqlite needs an explicit
/// sweep, run periodically by the binary's housekeeping task.
pub fn sweep_expired(conn: &rusqlite::Connection) -> Result<usize> {
    let now = now_rfc3339();
    let n = conn.execute("DELETE FROM history_messages WHERE expires_at < ?1", params![now])?;
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    #[test]
    fn write_turn_inserts_two_distinct_rows() {
        let conn = open_test_db();
        let (u, a) = write_turn(&conn, "u1", "telegram", Some("c1"), "hi", "hello!").unwrap();
        assert_ne!(u.timestamp_msgid, a.timestamp_msgid);
        assert_eq!(u.role, Role::User);
        assert_eq!(a.role, Role::Assistant);

        let listed = list_for_conversation(&conn, "u1", "c1").unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].role, Role::User, "oldest-first");
    }

    #[test]
    fn bucketed_groups_by_recency() {
        let conn = open_test_db();
        write_turn(&conn, "u1", "web", None, "hi", "hello").unwrap();
        let buckets = bucketed(&conn, "u1", 100).unwrap();
        assert_eq!(buckets.today.len(), 2);
    }
}
