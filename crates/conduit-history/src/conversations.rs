//! Conversation CRUD and assignment (§4.2).

use rusqlite::{params, OptionalExtension};
use tracing::instrument;
use uuid::Uuid;

use conduit_core::config::CONVERSATION_GAP_SECS;
use conduit_core::time::{now_rfc3339, parse_rfc3339};

use crate::error::{HistoryError, Result};
use crate::types::{Conversation, ConversationList};

const TITLE_MAX_CHARS: usize = 30;
pub const DEFAULT_PAGE_SIZE: u32 = 50;

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let pinned: i64 = row.get(6)?;
    let deleted: i64 = row.get(7)?;
    Ok(Conversation {
        unified_user_id: row.get(0)?,
        conversation_id: row.get(1)?,
        title: row.get(2)?,
        created_at: row.get(3)?,
        last_message_time: row.get(4)?,
        message_count: row.get::<_, i64>(5)? as u64,
        is_pinned: pinned != 0,
        is_deleted: deleted != 0,
        deleted_at: row.get(8)?,
    })
}

const SELECT_SQL: &str = "SELECT unified_user_id, conversation_id, title, created_at, \
    last_message_time, message_count, is_pinned, is_deleted, deleted_at FROM conversations";

/// First `TITLE_MAX_CHARS` characters of `text`, with a trailing ellipsis if
/// truncated (§4.2 "Conversation assignment").
pub fn derive_title(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= TITLE_MAX_CHARS {
        return text.to_string();
    }
    let truncated: String = chars[..TITLE_MAX_CHARS].iter().collect();
    format!("{truncated}…")
}

pub fn get(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    conversation_id: &str,
) -> Result<Option<Conversation>> {
    let sql = format!("{SELECT_SQL} WHERE unified_user_id = ?1 AND conversation_id = ?2");
    conn.query_row(&sql, params![unified_user_id, conversation_id], row_to_conversation)
        .optional()
        .map_err(HistoryError::from)
}

/// Creates a fresh conversation seeded by the first user turn's text.
#[instrument(skip(conn, seed_text))]
pub fn create(conn: &rusqlite::Connection, unified_user_id: &str, seed_text: &str) -> Result<Conversation> {
    let id = Uuid::now_v7().to_string();
    let now = now_rfc3339();
    let title = derive_title(seed_text);

    conn.execute(
        "INSERT INTO conversations
         (unified_user_id, conversation_id, title, created_at, last_message_time, message_count, is_pinned, is_deleted)
         VALUES (?1, ?2, ?3, ?4, ?4, 0, 0, 0)",
        params![unified_user_id, id, title, now],
    )?;

    Ok(Conversation {
        unified_user_id: unified_user_id.to_string(),
        conversation_id: id,
        title,
        created_at: now.clone(),
        last_message_time: now,
        message_count: 0,
        is_pinned: false,
        is_deleted: false,
        deleted_at: None,
    })
}

/// Finds the user's most recent non-deleted conversation, regardless of age.
fn most_recent(conn: &rusqlite::Connection, unified_user_id: &str) -> Result<Option<Conversation>> {
    let sql = format!(
        "{SELECT_SQL} WHERE unified_user_id = ?1 AND is_deleted = 0 ORDER BY last_message_time DESC LIMIT 1"
    );
    conn.query_row(&sql, params![unified_user_id], row_to_conversation)
        .optional()
        .map_err(HistoryError::from)
}

/// Resolves the `conversation_id` a new turn should attach to (§4.2
/// "Conversation assignment"): the explicit one if given, else the most
/// recent non-deleted conversation if within the 1-hour gap, else a new one.
#[instrument(skip(conn, seed_text))]
pub fn assign(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    explicit: Option<&str>,
    seed_text: &str,
) -> Result<Conversation> {
    if let Some(id) = explicit {
        if let Some(conv) = get(conn, unified_user_id, id)? {
            return Ok(conv);
        }
        return Err(HistoryError::NotFound(format!("conversation {id}")));
    }

    if let Some(recent) = most_recent(conn, unified_user_id)? {
        let last = parse_rfc3339(&recent.last_message_time);
        let now = chrono::Utc::now();
        if let Some(last) = last {
            if (now - last).num_seconds() <= CONVERSATION_GAP_SECS {
                return Ok(recent);
            }
        }
    }

    create(conn, unified_user_id, seed_text)
}

/// Bumps `last_message_time` and increments `message_count` by 2 (one user
/// turn + one assistant turn) after a completed exchange.
pub fn record_turn(conn: &rusqlite::Connection, unified_user_id: &str, conversation_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET last_message_time = ?1, message_count = message_count + 2
         WHERE unified_user_id = ?2 AND conversation_id = ?3",
        params![now_rfc3339(), unified_user_id, conversation_id],
    )?;
    Ok(())
}

pub fn rename(conn: &rusqlite::Connection, unified_user_id: &str, conversation_id: &str, title: &str) -> Result<()> {
    let rows = conn.execute(
        "UPDATE conversations SET title = ?1 WHERE unified_user_id = ?2 AND conversation_id = ?3",
        params![title, unified_user_id, conversation_id],
    )?;
    if rows == 0 {
        return Err(HistoryError::NotFound(conversation_id.to_string()));
    }
    Ok(())
}

pub fn set_pinned(conn: &rusqlite::Connection, unified_user_id: &str, conversation_id: &str, pinned: bool) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET is_pinned = ?1 WHERE unified_user_id = ?2 AND conversation_id = ?3",
        params![pinned as i64, unified_user_id, conversation_id],
    )?;
    Ok(())
}

/// Soft-delete only (§3 "Conversation").
pub fn soft_delete(conn: &rusqlite::Connection, unified_user_id: &str, conversation_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE conversations SET is_deleted = 1, deleted_at = ?1 WHERE unified_user_id = ?2 AND conversation_id = ?3",
        params![now_rfc3339(), unified_user_id, conversation_id],
    )?;
    Ok(())
}

/// Lists a user's conversations partitioned into `{pinned[], recent[]}`,
/// each ordered by `last_message_time` descending, page size default 50.
pub fn list(
    conn: &rusqlite::Connection,
    unified_user_id: &str,
    page_size: u32,
    include_deleted: bool,
) -> Result<ConversationList> {
    let deleted_clause = if include_deleted { "" } else { "AND is_deleted = 0" };
    let sql = format!(
        "{SELECT_SQL} WHERE unified_user_id = ?1 {deleted_clause} ORDER BY last_message_time DESC LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![unified_user_id, page_size as i64], row_to_conversation)?;

    let mut pinned = Vec::new();
    let mut recent = Vec::new();
    for row in rows {
        let conv = row?;
        if conv.is_pinned {
            pinned.push(conv);
        } else {
            recent.push(conv);
        }
    }

    Ok(ConversationList {
        pinned,
        recent,
        next_cursor: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_test_db;

    #[test]
    fn title_truncates_with_ellipsis() {
        let short = derive_title("hello");
        assert_eq!(short, "hello");
        let long = derive_title(&"x".repeat(40));
        assert_eq!(long.chars().count(), TITLE_MAX_CHARS + 1);
        assert!(long.ends_with('…'));
    }

    #[test]
    fn assign_reuses_recent_within_gap_and_opens_new_after() {
        let conn = open_test_db();
        let first = assign(&conn, "u1", None, "hello there").unwrap();
        record_turn(&conn, "u1", &first.conversation_id).unwrap();

        // Still within the 1h gap: reuse same conversation.
        let second = assign(&conn, "u1", None, "again").unwrap();
        assert_eq!(second.conversation_id, first.conversation_id);

        // Simulate time passing by backdating last_message_time.
        let old_time = (chrono::Utc::now() - chrono::Duration::hours(2))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        conn.execute(
            "UPDATE conversations SET last_message_time = ?1 WHERE conversation_id = ?2",
            params![old_time, first.conversation_id],
        )
        .unwrap();

        let third = assign(&conn, "u1", None, "new topic").unwrap();
        assert_ne!(third.conversation_id, first.conversation_id);
    }

    #[test]
    fn list_partitions_pinned_and_recent() {
        let conn = open_test_db();
        let a = create(&conn, "u1", "first").unwrap();
        let b = create(&conn, "u1", "second").unwrap();
        set_pinned(&conn, "u1", &a.conversation_id, true).unwrap();

        let listed = list(&conn, "u1", DEFAULT_PAGE_SIZE, false).unwrap();
        assert_eq!(listed.pinned.len(), 1);
        assert_eq!(listed.pinned[0].conversation_id, a.conversation_id);
        assert_eq!(listed.recent.len(), 1);
        assert_eq!(listed.recent[0].conversation_id, b.conversation_id);
    }

    #[test]
    fn soft_delete_excluded_by_default() {
        let conn = open_test_db();
        let a = create(&conn, "u1", "first").unwrap();
        soft_delete(&conn, "u1", &a.conversation_id).unwrap();

        let listed = list(&conn, "u1", DEFAULT_PAGE_SIZE, false).unwrap();
        assert_eq!(listed.pinned.len() + listed.recent.len(), 0);

        let with_deleted = list(&conn, "u1", DEFAULT_PAGE_SIZE, true).unwrap();
        assert_eq!(with_deleted.pinned.len() + with_deleted.recent.len(), 1);
    }
}
