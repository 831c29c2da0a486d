//! Per-channel response formatting (§4.7 step 3). Each channel gets its own
//! formatter; only Telegram imposes a length cap and metadata footer — the
//! web surface renders whatever the processor returned, unmodified.

use conduit_core::config::TELEGRAM_MAX_MESSAGE_LEN;

pub trait Formatter: Send + Sync {
    fn format(&self, content: &str, metadata: &serde_json::Value) -> String;
}

const EMPTY_RESPONSE_NOTICE: &str = "Done (no response content).";

#[derive(Debug, Clone, Copy, Default)]
pub struct TelegramFormatter;

impl Formatter for TelegramFormatter {
    fn format(&self, content: &str, metadata: &serde_json::Value) -> String {
        if content.trim().is_empty() {
            return EMPTY_RESPONSE_NOTICE.to_string();
        }

        let mut formatted = normalize_whitespace(content);
        if has_useful_metadata(metadata) {
            formatted = append_metadata_footer(formatted, metadata);
        }
        if formatted.chars().count() > TELEGRAM_MAX_MESSAGE_LEN {
            formatted = truncate_message(&formatted);
        }
        formatted
    }
}

/// Strips trailing whitespace on every line and collapses runs of three or
/// more blank lines down to two.
fn normalize_whitespace(text: &str) -> String {
    let trimmed_lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for (i, line) in trimmed_lines.iter().enumerate() {
        if line.is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        if i + 1 < trimmed_lines.len() {
            out.push('\n');
        }
    }
    out.trim().to_string()
}

fn has_useful_metadata(metadata: &serde_json::Value) -> bool {
    metadata.get("processing_time").is_some()
        || metadata.get("model").is_some()
        || metadata.get("tokens_used").is_some()
}

fn append_metadata_footer(content: String, metadata: &serde_json::Value) -> String {
    let mut parts = Vec::new();

    if let Some(ms) = metadata.get("processing_time").and_then(|v| v.as_f64()) {
        parts.push(format!("{:.0}ms", ms));
    }
    if let Some(model) = metadata.get("model").and_then(|v| v.as_str()) {
        if !model.is_empty() {
            parts.push(simplify_model_name(model));
        }
    }
    if let Some(tokens) = metadata.get("tokens_used").and_then(|v| v.as_u64()) {
        parts.push(format!("{} tokens", tokens));
    }

    if parts.is_empty() {
        return content;
    }
    format!("{content}\n\n---\n{}", parts.join(" \u{2022} "))
}

fn simplify_model_name(model: &str) -> String {
    const KNOWN: &[(&str, &str)] = &[
        ("claude-3-opus", "Opus"),
        ("claude-3-sonnet", "Sonnet"),
        ("claude-3-haiku", "Haiku"),
        ("gpt-4", "GPT-4"),
        ("gpt-3.5-turbo", "GPT-3.5"),
    ];
    let lower = model.to_lowercase();
    for (full, short) in KNOWN {
        if lower.contains(full) {
            return short.to_string();
        }
    }
    if model.len() > 20 {
        format!("{}...", &model[..17])
    } else {
        model.to_string()
    }
}

/// Truncates at the last paragraph break before `MAX - 100`, falling back to
/// a hard cut when no break falls within the final 20% of that budget.
fn truncate_message(text: &str) -> String {
    let max_content_len = TELEGRAM_MAX_MESSAGE_LEN - 100;
    let total_chars = text.chars().count();
    if total_chars <= max_content_len {
        return text.to_string();
    }

    let cut_byte = char_boundary_at(text, max_content_len);
    let mut truncated = &text[..cut_byte];
    if let Some(last_break) = truncated.rfind("\n\n") {
        if last_break as f64 > max_content_len as f64 * 0.8 {
            truncated = &truncated[..last_break];
        }
    }

    format!(
        "{truncated}\n\n---\n\u{26a0}\u{fe0f} Message truncated ({total_chars} characters total)."
    )
}

fn char_boundary_at(text: &str, char_count: usize) -> usize {
    text.char_indices()
        .nth(char_count)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}

/// Web responses are delivered verbatim — the browser client renders
/// markdown/length itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebFormatter;

impl Formatter for WebFormatter {
    fn format(&self, content: &str, _metadata: &serde_json::Value) -> String {
        if content.trim().is_empty() {
            EMPTY_RESPONSE_NOTICE.to_string()
        } else {
            content.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_blank_line_runs() {
        let formatter = TelegramFormatter;
        let input = "line one\n\n\n\n\nline two";
        let out = formatter.format(input, &serde_json::json!({}));
        assert_eq!(out, "line one\n\nline two");
    }

    #[test]
    fn strips_trailing_whitespace_per_line() {
        let formatter = TelegramFormatter;
        let out = formatter.format("hello   \nworld\t", &serde_json::json!({}));
        assert_eq!(out, "hello\nworld");
    }

    #[test]
    fn appends_metadata_footer_when_present() {
        let formatter = TelegramFormatter;
        let metadata = serde_json::json!({"processing_time": 842, "model": "claude-3-sonnet", "tokens_used": 120});
        let out = formatter.format("done", &metadata);
        assert!(out.contains("842ms"));
        assert!(out.contains("Sonnet"));
        assert!(out.contains("120 tokens"));
    }

    #[test]
    fn omits_footer_without_useful_metadata() {
        let formatter = TelegramFormatter;
        let out = formatter.format("done", &serde_json::json!({"other": 1}));
        assert_eq!(out, "done");
    }

    #[test]
    fn truncates_long_messages_with_note() {
        let formatter = TelegramFormatter;
        let body = "x".repeat(5000);
        let out = formatter.format(&body, &serde_json::json!({}));
        assert!(out.chars().count() <= TELEGRAM_MAX_MESSAGE_LEN);
        assert!(out.contains("truncated"));
    }

    #[test]
    fn empty_content_gets_notice() {
        let formatter = TelegramFormatter;
        assert_eq!(formatter.format("   ", &serde_json::json!({})), EMPTY_RESPONSE_NOTICE);
    }

    #[test]
    fn web_formatter_passes_through_unmodified() {
        let formatter = WebFormatter;
        let raw = "  kept as-is  \n\n\n\nwith blanks";
        assert_eq!(formatter.format(raw, &serde_json::json!({})), raw);
    }
}
