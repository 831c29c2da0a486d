//! Channel delivery abstractions (§4.7 step 4). The router owns the
//! channel-selection and splitting policy; the actual outbound transport
//! (Telegram Bot API HTTP calls, the WebSocket management connection) is
//! supplied by the ingress crates that own those clients, kept decoupled so
//! this crate stays free of any provider SDK.

use async_trait::async_trait;
use thiserror::Error;

use conduit_core::config::TELEGRAM_MAX_MESSAGE_LEN;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("invalid user id for this channel: {0}")]
    InvalidUserId(String),
    #[error("connection not found: {0}")]
    ConnectionGone(String),
    #[error("transport error: {0}")]
    Transport(String),
}

/// Sends already-formatted text to a Telegram chat, implemented by
/// `conduit-telegram` over the Bot API's `sendMessage`.
#[async_trait]
pub trait TelegramSender: Send + Sync {
    async fn send_chunk(&self, chat_id: i64, text: &str) -> Result<(), DeliveryError>;
}

/// Posts a server frame to a live WebSocket connection, implemented by
/// `conduit-web` over its connection-management endpoint.
#[async_trait]
pub trait WebSender: Send + Sync {
    async fn send_frame(&self, connection_id: &str, content: &str) -> Result<(), DeliveryError>;
}

/// Strips an optional `tg:` prefix and parses the remainder as a numeric
/// chat id, required by the Bot API (§4.7 step 4).
pub fn parse_telegram_user_id(user_id: &str) -> Result<i64, DeliveryError> {
    let clean = user_id.strip_prefix("tg:").unwrap_or(user_id);
    clean
        .parse::<i64>()
        .map_err(|_| DeliveryError::InvalidUserId(user_id.to_string()))
}

/// Reserved headroom for the `"Part {i}/{total}\n\n"` prefix, so a numbered
/// part never exceeds `TELEGRAM_MAX_MESSAGE_LEN` once the prefix is added.
const NUMBERING_RESERVE: usize = 100;

/// Splits formatted Telegram text into numbered parts when it still exceeds
/// the hard provider limit, preferring newline boundaries. The formatter
/// truncates router-originated replies to fit in one message already; this
/// exists for the rarer oversized message (e.g. an unformatted command
/// reply) that bypasses the formatter entirely.
pub fn split_for_telegram(text: &str) -> Vec<String> {
    let chunks = split_at_boundary(text, TELEGRAM_MAX_MESSAGE_LEN - NUMBERING_RESERVE);
    if chunks.len() <= 1 {
        return chunks;
    }
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| format!("Part {}/{total}\n\n{chunk}", i + 1))
        .collect()
}

fn split_at_boundary(text: &str, max_len: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut pos = 0;
    while pos < chars.len() {
        let mut end = (pos + max_len).min(chars.len());
        if end < chars.len() {
            if let Some(newline_rel) = chars[pos..end].iter().rposition(|c| *c == '\n') {
                if newline_rel > 0 {
                    end = pos + newline_rel + 1;
                }
            }
        }
        chunks.push(chars[pos..end].iter().collect());
        pos = end;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_id_with_prefix() {
        assert_eq!(parse_telegram_user_id("tg:316743844").unwrap(), 316743844);
        assert_eq!(parse_telegram_user_id("316743844").unwrap(), 316743844);
    }

    #[test]
    fn rejects_non_numeric_user_id() {
        assert!(parse_telegram_user_id("tg:not-a-number").is_err());
    }

    #[test]
    fn short_message_is_not_split() {
        let parts = split_for_telegram("hello");
        assert_eq!(parts, vec!["hello".to_string()]);
    }

    #[test]
    fn long_message_splits_with_numbering() {
        let body = "x".repeat(9000);
        let parts = split_for_telegram(&body);
        assert!(parts.len() >= 2);
        assert!(parts[0].starts_with("Part 1/"));
        for part in &parts {
            assert!(part.chars().count() <= TELEGRAM_MAX_MESSAGE_LEN);
        }
    }
}
