use chrono::{DateTime, Utc};

/// Display bucket for grouping history by recency (§4.2 "Time grouping for display").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBucket {
    Today,
    Yesterday,
    ThisWeek,
    Earlier,
}

impl TimeBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeBucket::Today => "today",
            TimeBucket::Yesterday => "yesterday",
            TimeBucket::ThisWeek => "this_week",
            TimeBucket::Earlier => "earlier",
        }
    }
}

/// Buckets `at` relative to `now`, both UTC, using midnight boundaries.
pub fn bucket_for(at: DateTime<Utc>, now: DateTime<Utc>) -> TimeBucket {
    let today_midnight = now.date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
    let yesterday_midnight = today_midnight - chrono::Duration::days(1);
    let week_ago_midnight = today_midnight - chrono::Duration::days(7);

    if at >= today_midnight {
        TimeBucket::Today
    } else if at >= yesterday_midnight {
        TimeBucket::Yesterday
    } else if at >= week_ago_midnight {
        TimeBucket::ThisWeek
    } else {
        TimeBucket::Earlier
    }
}

/// Now as RFC3339 (millisecond precision, 'Z' suffix) — the storage format
/// used for every `created_at`/`updated_at`/`expires_at` column.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub fn parse_rfc3339(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|d| d.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn buckets_boundaries() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let today = Utc.with_ymd_and_hms(2026, 3, 10, 1, 0, 0).unwrap();
        let yesterday = Utc.with_ymd_and_hms(2026, 3, 9, 23, 59, 0).unwrap();
        let this_week = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2026, 2, 1, 12, 0, 0).unwrap();

        assert_eq!(bucket_for(today, now).as_str(), "today");
        assert_eq!(bucket_for(yesterday, now).as_str(), "yesterday");
        assert_eq!(bucket_for(this_week, now).as_str(), "this_week");
        assert_eq!(bucket_for(earlier, now).as_str(), "earlier");
    }
}
