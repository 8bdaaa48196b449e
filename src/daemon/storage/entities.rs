use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// A closed stretch of time spent in one application. Sessions are immutable
/// once emitted by the tracker: storage and aggregation only ever read them.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
pub struct Session {
    /// Normalized application identifier, for example `firefox`.
    pub application: Arc<str>,
    /// Raw window title at session start. Absent when title redaction is
    /// enabled in the settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window_title: Option<Arc<str>>,
    /// Assigned once when the session opens, immutable afterwards.
    pub category: Category,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end: DateTime<Utc>,
}

impl Session {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Key used to deduplicate retried appends. Two sessions from the same
    /// stream can never share an application and start time.
    pub fn emit_key(&self) -> (Arc<str>, DateTime<Utc>) {
        (self.application.clone(), self.start)
    }

    /// Time this session spent inside `[from, to)`. Sessions spanning a
    /// boundary contribute only the overlapping part.
    pub fn overlap(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Duration {
        let start = self.start.max(from);
        let end = self.end.min(to);
        if end > start {
            end - start
        } else {
            Duration::zero()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn session(start_s: i64, end_s: i64) -> Session {
        Session {
            application: "editor".into(),
            window_title: None,
            category: Category::Productive,
            start: Utc.timestamp_opt(start_s, 0).unwrap(),
            end: Utc.timestamp_opt(end_s, 0).unwrap(),
        }
    }

    #[test]
    fn overlap_clips_to_window() {
        // Session 10:00-11:00, window 10:30-10:45 -> exactly 15 minutes.
        let s = session(36_000, 39_600);
        let from = Utc.timestamp_opt(37_800, 0).unwrap();
        let to = Utc.timestamp_opt(38_700, 0).unwrap();
        assert_eq!(s.overlap(from, to), Duration::minutes(15));
    }

    #[test]
    fn overlap_outside_window_is_zero() {
        let s = session(0, 100);
        let from = Utc.timestamp_opt(100, 0).unwrap();
        let to = Utc.timestamp_opt(200, 0).unwrap();
        // End is exclusive, a session touching the window start contributes
        // nothing.
        assert_eq!(s.overlap(from, to), Duration::zero());
    }

    #[test]
    fn serde_round_trips_without_title() {
        let s = session(0, 10);
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("window_title"));
        assert_eq!(serde_json::from_str::<Session>(&json).unwrap(), s);
    }
}
