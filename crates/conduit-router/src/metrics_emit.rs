//! Named counters/histograms the router is required to emit (§4.7 step 6).
//! Grounded on the `metrics` crate's `counter!`/`histogram!` macro usage
//! pattern (the teacher repo carries no metrics crate at all).

use metrics::{counter, histogram};

pub fn invalid_event() {
    counter!("RouterInvalidEvent").increment(1);
}

pub fn unsupported_channel(channel: &str) {
    counter!("RouterUnsupportedChannel", "channel" => channel.to_string()).increment(1);
}

pub fn success(channel: &str, duration_ms: u64) {
    counter!("RouterSuccess").increment(1);
    counter!(format!("Router{}Success", capitalize(channel))).increment(1);
    histogram!("RouterDuration").record(duration_ms as f64);
}

pub fn failure(channel: &str, duration_ms: u64) {
    counter!("RouterFailure").increment(1);
    counter!(format!("Router{}Failure", capitalize(channel))).increment(1);
    histogram!("RouterDuration").record(duration_ms as f64);
}

fn capitalize(channel: &str) -> String {
    let mut chars = channel.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capitalize_channel_names() {
        assert_eq!(capitalize("telegram"), "Telegram");
        assert_eq!(capitalize("web"), "Web");
        assert_eq!(capitalize(""), "");
    }
}
