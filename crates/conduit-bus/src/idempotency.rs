//! Consumer-side idempotency guard (§4.6): "at-least-once" delivery means
//! `message.completed`/`message.failed` may be redelivered for the same
//! `messageId`. A small in-memory seen-set with TTL is the acceptable
//! per-instance trade-off named in §5 ("best-effort... acceptable trade-off
//! per source design").

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn for_message(message_id: &str) -> Self {
        Self(message_id.to_string())
    }
}

pub struct SeenSet {
    inner: Mutex<HashMap<String, Instant>>,
    ttl: Duration,
}

impl SeenSet {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Returns `true` if `key` was already seen within the TTL window
    /// (caller should skip reprocessing); otherwise records it and returns
    /// `false`.
    pub fn seen_or_insert(&self, key: &IdempotencyKey) -> bool {
        let now = Instant::now();
        let mut guard = self.inner.lock().unwrap();
        guard.retain(|_, seen_at| now.duration_since(*seen_at) <= self.ttl);

        if guard.contains_key(&key.0) {
            return true;
        }
        guard.insert(key.0.clone(), now);
        false
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_seen_false_then_true() {
        let set = SeenSet::new(Duration::from_secs(60));
        let key = IdempotencyKey::for_message("msg-1");
        assert!(!set.seen_or_insert(&key));
        assert!(set.seen_or_insert(&key));
    }

    #[test]
    fn entries_expire_after_ttl() {
        let set = SeenSet::new(Duration::from_millis(10));
        let key = IdempotencyKey::for_message("msg-1");
        assert!(!set.seen_or_insert(&key));
        std::thread::sleep(Duration::from_millis(20));
        assert!(!set.seen_or_insert(&key), "expired entry should be treated as unseen");
    }
}
