use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

use chrono::{DateTime, Duration, Utc};

/// Tracks the moment user activity was last seen. The timestamp lives in an
/// atomic so activity can be reported from outside the polling loop (an input
/// event hook on another thread) without sharing tracker state.
///
/// Updates only ever move the timestamp forward, which lets several sources
/// report activity without ordering between them.
pub struct IdleDetector {
    last_activity: Arc<AtomicI64>,
}

impl IdleDetector {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            last_activity: Arc::new(AtomicI64::new(at.timestamp_millis())),
        }
    }

    /// A cloneable handle other threads can use to report user input.
    pub fn handle(&self) -> ActivityHandle {
        ActivityHandle {
            last_activity: self.last_activity.clone(),
        }
    }

    pub fn record_activity(&self, at: DateTime<Utc>) {
        self.last_activity
            .fetch_max(at.timestamp_millis(), Ordering::AcqRel);
    }

    /// Feeds an idle-time reading from the platform probe: the user was last
    /// active `idle_for` before `now`.
    pub fn record_probe_idle(&self, now: DateTime<Utc>, idle_for: Duration) {
        self.record_activity(now - idle_for);
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity.load(Ordering::Acquire))
            .expect("Stored timestamp is always valid")
    }

    pub fn idle_duration(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity()).max(Duration::zero())
    }

    pub fn is_idle(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.idle_duration(now) >= threshold
    }
}

#[derive(Clone)]
pub struct ActivityHandle {
    last_activity: Arc<AtomicI64>,
}

impl ActivityHandle {
    pub fn record_activity(&self, at: DateTime<Utc>) {
        self.last_activity
            .fetch_max(at.timestamp_millis(), Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    #[test]
    fn idle_exactly_at_threshold() {
        let detector = IdleDetector::new(at(0));
        let threshold = Duration::seconds(300);

        assert!(!detector.is_idle(at(299), threshold));
        assert!(detector.is_idle(at(300), threshold));
        assert!(detector.is_idle(at(400), threshold));
    }

    #[test]
    fn activity_resets_idle_duration() {
        let detector = IdleDetector::new(at(0));
        detector.record_activity(at(250));
        assert_eq!(detector.idle_duration(at(300)), Duration::seconds(50));
    }

    #[test]
    fn updates_never_move_backwards() {
        let detector = IdleDetector::new(at(100));
        detector.record_activity(at(50));
        assert_eq!(detector.last_activity(), at(100));

        // A probe reading claiming older activity does not regress either.
        detector.record_probe_idle(at(300), Duration::seconds(250));
        assert_eq!(detector.last_activity(), at(100));
    }

    #[test]
    fn probe_idle_reading_is_applied() {
        let detector = IdleDetector::new(at(0));
        detector.record_probe_idle(at(300), Duration::seconds(10));
        assert_eq!(detector.last_activity(), at(290));
    }

    #[test]
    fn handle_reports_from_another_thread() {
        let detector = IdleDetector::new(at(0));
        let handle = detector.handle();
        std::thread::spawn(move || handle.record_activity(at(42)))
            .join()
            .unwrap();
        assert_eq!(detector.last_activity(), at(42));
    }
}
