//! History export (§4.2): JSON (raw list) and Markdown (grouped by date).

use std::collections::BTreeMap;
use std::fmt::Write as _;

use crate::types::HistoryMessage;

pub fn to_json(messages: &[HistoryMessage]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(messages)
}

/// Messages sorted oldest-first, grouped by `YYYY-MM-DD` date heading, each
/// entry prefixed by `HH:MM:SS`, role, and channel tag.
pub fn to_markdown(messages: &[HistoryMessage]) -> String {
    let mut sorted = messages.to_vec();
    sorted.sort_by(|a, b| a.timestamp_msgid.cmp(&b.timestamp_msgid));

    let mut by_date: BTreeMap<String, Vec<&HistoryMessage>> = BTreeMap::new();
    for msg in &sorted {
        let (ts, _) = msg.timestamp_msgid.split_once('#').unwrap_or((&msg.timestamp_msgid, ""));
        let date = ts.get(0..10).unwrap_or(ts).to_string();
        by_date.entry(date).or_default().push(msg);
    }

    let mut out = String::new();
    for (date, msgs) in by_date {
        let _ = writeln!(out, "# {date}\n");
        for msg in msgs {
            let (ts, _) = msg.timestamp_msgid.split_once('#').unwrap_or((&msg.timestamp_msgid, ""));
            let time = ts.get(11..19).unwrap_or(ts);
            let _ = writeln!(
                out,
                "**{time}** [{role}/{channel}]: {text}\n",
                role = msg.role.as_str(),
                channel = msg.channel,
                text = msg.text,
            );
        }
    }
    out
}

/// Parses the role/time headers back out of a Markdown export — used by
/// the round-trip test in §8 ("Markdown export of a history then
/// re-parsing the role/time headers yields the same message set").
pub fn parse_markdown_headers(markdown: &str) -> Vec<(String, String, String)> {
    let mut out = Vec::new();
    for line in markdown.lines() {
        let Some(rest) = line.strip_prefix("**") else { continue };
        let Some((time, rest)) = rest.split_once("** [") else { continue };
        let Some((tag, _)) = rest.split_once("]:") else { continue };
        let Some((role, channel)) = tag.split_once('/') else { continue };
        out.push((time.to_string(), role.to_string(), channel.to_string()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    fn msg(ts: &str, role: Role, text: &str, channel: &str) -> HistoryMessage {
        HistoryMessage {
            unified_user_id: "u1".into(),
            timestamp_msgid: format!("{ts}#{}", uuid::Uuid::new_v4()),
            role,
            text: text.into(),
            attachments: vec![],
            channel: channel.into(),
            conversation_id: Some("c1".into()),
        }
    }

    #[test]
    fn markdown_groups_by_date_and_round_trips_headers() {
        let messages = vec![
            msg("2026-03-10T08:00:00.000Z", Role::User, "hi", "telegram"),
            msg("2026-03-10T08:00:05.000Z", Role::Assistant, "hello", "telegram"),
        ];
        let markdown = to_markdown(&messages);
        assert!(markdown.contains("# 2026-03-10"));
        assert!(markdown.contains("**08:00:00** [user/telegram]: hi"));

        let headers = parse_markdown_headers(&markdown);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0], ("08:00:00".to_string(), "user".to_string(), "telegram".to_string()));
        assert_eq!(headers[1].1, "assistant");
    }

    #[test]
    fn json_export_round_trips() {
        let messages = vec![msg("2026-03-10T08:00:00.000Z", Role::User, "hi", "web")];
        let json = to_json(&messages).unwrap();
        let parsed: Vec<HistoryMessage> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].text, "hi");
    }
}
