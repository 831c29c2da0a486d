//! In-memory Connection Registry (§4.3): maps a live WebSocket
//! `connection_id` to the `unified_user_id` that opened it. TTL-bounded —
//! storage TTL is a backstop for disconnects the gateway never reports.

use dashmap::DashMap;
use tracing::{info, instrument};

use conduit_core::config::CONNECTION_TTL_SECS;
use conduit_core::error::{ConduitError, Result};
use conduit_core::time::{now_rfc3339, parse_rfc3339};

use crate::types::Connection;

/// Read-only after construction in the request-handling sense: every method
/// takes `&self` because `DashMap` provides interior mutability per shard,
/// matching the single-registry-per-instance model described in §5.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// `$connect`: inserts a fresh record. Re-connecting with the same
    /// `connection_id` overwrites the previous entry.
    #[instrument(skip(self))]
    pub fn connect(&self, connection_id: &str, unified_user_id: &str, email: Option<&str>) -> Connection {
        let now = now_rfc3339();
        let conn = Connection {
            connection_id: connection_id.to_string(),
            unified_user_id: unified_user_id.to_string(),
            email: email.map(String::from),
            connected_at: now.clone(),
            last_activity: now,
        };
        self.connections.insert(connection_id.to_string(), conn.clone());
        conn
    }

    /// `$default`: bumps `last_activity`. Absent record means the gateway
    /// raced a disconnect against an in-flight frame — caller should 404.
    pub fn touch(&self, connection_id: &str) -> Result<Connection> {
        let mut entry = self
            .connections
            .get_mut(connection_id)
            .ok_or_else(|| ConduitError::NotFound(format!("connection {connection_id}")))?;
        entry.last_activity = now_rfc3339();
        Ok(entry.clone())
    }

    pub fn get(&self, connection_id: &str) -> Option<Connection> {
        self.connections.get(connection_id).map(|e| e.clone())
    }

    /// `$disconnect`, or the gateway reporting the connection `Gone` during
    /// a send — both paths are idempotent no-ops if already removed.
    pub fn disconnect(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Storage-TTL backstop: drops connections whose `last_activity` is
    /// older than `CONNECTION_TTL_SECS`, for dropped disconnects the
    /// gateway never reported. Run periodically by the binary's
    /// housekeeping task.
    #[instrument(skip(self))]
    pub fn reap_expired(&self) -> usize {
        let now = chrono::Utc::now();
        let mut stale = Vec::new();
        for entry in self.connections.iter() {
            if let Some(last) = parse_rfc3339(&entry.last_activity) {
                if (now - last).num_seconds() > CONNECTION_TTL_SECS {
                    stale.push(entry.key().clone());
                }
            }
        }
        let count = stale.len();
        for key in stale {
            self.connections.remove(&key);
        }
        if count > 0 {
            info!(count, "reaped expired connections");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_touch_disconnect_round_trip() {
        let registry = ConnectionRegistry::new();
        let conn = registry.connect("c1", "u1", Some("alice@example.com"));
        assert_eq!(conn.unified_user_id, "u1");
        assert_eq!(registry.len(), 1);

        let touched = registry.touch("c1").unwrap();
        assert_eq!(touched.connection_id, "c1");

        registry.disconnect("c1");
        assert!(registry.get("c1").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn touch_missing_connection_errors() {
        let registry = ConnectionRegistry::new();
        let err = registry.touch("ghost").unwrap_err();
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn reap_expired_removes_stale_entries_only() {
        let registry = ConnectionRegistry::new();
        registry.connect("fresh", "u1", None);
        registry.connect("stale", "u2", None);

        let old = (chrono::Utc::now() - chrono::Duration::hours(3))
            .to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
        registry.connections.get_mut("stale").unwrap().last_activity = old;

        let reaped = registry.reap_expired();
        assert_eq!(reaped, 1);
        assert!(registry.get("fresh").is_some());
        assert!(registry.get("stale").is_none());
    }
}
