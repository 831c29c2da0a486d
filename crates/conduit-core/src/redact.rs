//! Deep-copy-then-overwrite-at-paths redaction, generalised from the
//! Telegram webhook debug payload so any future debug surface can reuse it.

use serde_json::Value;

/// Replacement string written at every redacted leaf.
pub const REDACTED: &str = "[REDACTED]";

/// Returns a redacted copy of `value` with every leaf reachable by one of
/// `paths` overwritten. The original `value` is never mutated. A path whose
/// keys don't resolve (missing intermediate object, wrong type) is silently
/// skipped — matching the original traversal's tolerance for absent fields.
///
/// List-valued leaves become a same-length list of `[REDACTED]` strings;
/// scalar leaves become the single string `[REDACTED]`.
pub fn redact_paths(value: &Value, paths: &[&[&str]]) -> Value {
    let mut copy = value.clone();
    for path in paths {
        redact_path(&mut copy, path);
    }
    copy
}

fn redact_path(value: &mut Value, path: &[&str]) {
    if path.is_empty() {
        return;
    }
    let Some(obj) = value.as_object_mut() else {
        return;
    };
    let key = path[0];

    if path.len() == 1 {
        if let Some(leaf) = obj.get_mut(key) {
            *leaf = match leaf {
                Value::Array(items) => {
                    Value::Array(vec![Value::String(REDACTED.to_string()); items.len()])
                }
                _ => Value::String(REDACTED.to_string()),
            };
        }
    } else if let Some(child) = obj.get_mut(key) {
        redact_path(child, &path[1..]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn redacts_scalar_and_list_leaves_and_skips_missing() {
        let input = json!({
            "headers": {"X-Telegram-Bot-Api-Secret-Token": "s3cr3t"},
            "multiValueHeaders": {"X-Telegram-Bot-Api-Secret-Token": ["s3cr3t"]},
            "requestContext": {"accountId": "123456789012"},
            "body": {"text": "hello"}
        });

        let paths: [&[&str]; 3] = [
            &["headers", "X-Telegram-Bot-Api-Secret-Token"],
            &["multiValueHeaders", "X-Telegram-Bot-Api-Secret-Token"],
            &["requestContext", "accountId"],
        ];

        let redacted = redact_paths(&input, &paths);

        assert_eq!(redacted["headers"]["X-Telegram-Bot-Api-Secret-Token"], REDACTED);
        assert_eq!(
            redacted["multiValueHeaders"]["X-Telegram-Bot-Api-Secret-Token"],
            json!([REDACTED])
        );
        assert_eq!(redacted["requestContext"]["accountId"], REDACTED);
        assert_eq!(redacted["body"]["text"], "hello");

        // Original untouched.
        assert_eq!(input["headers"]["X-Telegram-Bot-Api-Secret-Token"], "s3cr3t");
    }

    #[test]
    fn missing_paths_are_silently_skipped() {
        let input = json!({"a": 1});
        let redacted = redact_paths(&input, &[&["nope", "deeper"]]);
        assert_eq!(redacted, input);
    }
}
