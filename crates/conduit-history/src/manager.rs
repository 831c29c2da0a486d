use std::sync::Mutex;

use rusqlite::Connection;
use tracing::instrument;

use crate::error::Result;
use crate::types::{BucketedHistory, Conversation, ConversationList, HistoryMessage};
use crate::{conversations, history};

/// Thread-safe facade over a single SQLite connection — the `conduit-web`
/// binary holds one `Arc<HistoryManager>` shared across every request.
pub struct HistoryManager {
    db: Mutex<Connection>,
}

impl HistoryManager {
    pub fn new(conn: Connection) -> Result<Self> {
        crate::db::init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    #[instrument(skip(self, user_text, assistant_text))]
    pub fn record_exchange(
        &self,
        unified_user_id: &str,
        channel: &str,
        conversation_id: Option<&str>,
        user_text: &str,
        assistant_text: &str,
    ) -> Result<(HistoryMessage, HistoryMessage)> {
        let conn = self.db.lock().unwrap();
        let result = history::write_turn(&conn, unified_user_id, channel, conversation_id, user_text, assistant_text)?;
        if let Some(id) = conversation_id {
            conversations::record_turn(&conn, unified_user_id, id)?;
        }
        Ok(result)
    }

    pub fn record_exchange_best_effort(
        &self,
        unified_user_id: &str,
        channel: &str,
        conversation_id: Option<&str>,
        user_text: &str,
        assistant_text: &str,
    ) {
        if let Err(e) = self.record_exchange(unified_user_id, channel, conversation_id, user_text, assistant_text) {
            tracing::warn!(unified_user_id, error = %e, "history write failed (best-effort)");
        }
    }

    pub fn assign_conversation(&self, unified_user_id: &str, explicit: Option<&str>, seed_text: &str) -> Result<Conversation> {
        let conn = self.db.lock().unwrap();
        conversations::assign(&conn, unified_user_id, explicit, seed_text)
    }

    /// Explicit conversation creation for the web `POST /conversations` surface.
    pub fn create_conversation(&self, unified_user_id: &str, seed_text: &str) -> Result<Conversation> {
        let conn = self.db.lock().unwrap();
        conversations::create(&conn, unified_user_id, seed_text)
    }

    pub fn get_conversation(&self, unified_user_id: &str, conversation_id: &str) -> Result<Option<Conversation>> {
        let conn = self.db.lock().unwrap();
        conversations::get(&conn, unified_user_id, conversation_id)
    }

    pub fn list_conversations(&self, unified_user_id: &str, page_size: u32, include_deleted: bool) -> Result<ConversationList> {
        let conn = self.db.lock().unwrap();
        conversations::list(&conn, unified_user_id, page_size, include_deleted)
    }

    pub fn rename_conversation(&self, unified_user_id: &str, conversation_id: &str, title: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conversations::rename(&conn, unified_user_id, conversation_id, title)
    }

    pub fn set_pinned(&self, unified_user_id: &str, conversation_id: &str, pinned: bool) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conversations::set_pinned(&conn, unified_user_id, conversation_id, pinned)
    }

    pub fn delete_conversation(&self, unified_user_id: &str, conversation_id: &str) -> Result<()> {
        let conn = self.db.lock().unwrap();
        conversations::soft_delete(&conn, unified_user_id, conversation_id)
    }

    pub fn conversation_messages(&self, unified_user_id: &str, conversation_id: &str) -> Result<Vec<HistoryMessage>> {
        let conn = self.db.lock().unwrap();
        history::list_for_conversation(&conn, unified_user_id, conversation_id)
    }

    pub fn bucketed_history(&self, unified_user_id: &str, limit: u32) -> Result<BucketedHistory> {
        let conn = self.db.lock().unwrap();
        history::bucketed(&conn, unified_user_id, limit)
    }

    pub fn user_history(&self, unified_user_id: &str, channel: Option<&str>, limit: u32) -> Result<Vec<HistoryMessage>> {
        let conn = self.db.lock().unwrap();
        history::list_for_user(&conn, unified_user_id, channel, limit)
    }

    pub fn stats(&self, unified_user_id: &str) -> Result<(u64, u64)> {
        let conn = self.db.lock().unwrap();
        history::stats(&conn, unified_user_id)
    }

    pub fn sweep_expired(&self) -> Result<usize> {
        let conn = self.db.lock().unwrap();
        history::sweep_expired(&conn)
    }

    pub fn migrate_legacy_conversations(&self) -> Result<usize> {
        let conn = self.db.lock().unwrap();
        crate::migration::migrate_conversations(&conn)
    }
}
