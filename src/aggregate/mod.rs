//! Read-side rollups over closed sessions. [summarize] is a pure function
//! over an immutable session snapshot, so callers may run it concurrently
//! and repeatedly with identical results.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Duration, Utc};

use crate::{category::Category, daemon::storage::entities::Session};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationUsage {
    pub application: Arc<str>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryUsage {
    pub category: Category,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total: Duration,
    pub by_application: Vec<ApplicationUsage>,
    pub by_category: Vec<CategoryUsage>,
    /// Weighted share of well-spent time, 0-100. Productive time counts
    /// fully, neutral time for half. 0 when nothing was tracked.
    pub productivity_score: u8,
}

/// Rolls up all sessions overlapping `[from, to)`. Contributions are clipped
/// exactly to the window; a session spanning a boundary only counts its
/// in-window part.
pub fn summarize(sessions: &[Session], from: DateTime<Utc>, to: DateTime<Utc>) -> Summary {
    let mut total = Duration::zero();
    let mut by_application = HashMap::<Arc<str>, Duration>::new();
    let mut by_category = HashMap::<Category, Duration>::new();

    for session in sessions {
        let contribution = session.overlap(from, to);
        if contribution.is_zero() {
            continue;
        }

        total += contribution;
        *by_application
            .entry(session.application.clone())
            .or_insert_with(Duration::zero) += contribution;
        *by_category
            .entry(session.category)
            .or_insert_with(Duration::zero) += contribution;
    }

    let productivity_score = productivity_score(&by_category, total);

    let mut by_application = by_application
        .into_iter()
        .map(|(application, duration)| ApplicationUsage {
            application,
            duration,
        })
        .collect::<Vec<_>>();
    by_application.sort_by(|a, b| {
        b.duration
            .cmp(&a.duration)
            .then_with(|| a.application.cmp(&b.application))
    });

    let mut by_category = by_category
        .into_iter()
        .map(|(category, duration)| CategoryUsage { category, duration })
        .collect::<Vec<_>>();
    by_category.sort_by(|a, b| {
        b.duration
            .cmp(&a.duration)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
    });

    Summary {
        total,
        by_application,
        by_category,
        productivity_score,
    }
}

fn productivity_score(by_category: &HashMap<Category, Duration>, total: Duration) -> u8 {
    let total_ms = total.num_milliseconds();
    if total_ms <= 0 {
        return 0;
    }

    let weighted: f64 = by_category
        .iter()
        .map(|(category, duration)| category.score_weight() * duration.num_milliseconds() as f64)
        .sum();

    (100.0 * weighted / total_ms as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn session(application: &str, category: Category, start_s: i64, end_s: i64) -> Session {
        Session {
            application: application.into(),
            window_title: None,
            category,
            start: at(start_s),
            end: at(end_s),
        }
    }

    #[test]
    fn empty_window_scores_zero() {
        let summary = summarize(&[], at(0), at(100));
        assert_eq!(summary.total, Duration::zero());
        assert_eq!(summary.productivity_score, 0);
        assert!(summary.by_application.is_empty());
    }

    #[test]
    fn sessions_are_clipped_to_the_window() {
        // Session 10:00-11:00 summarized over 10:30-10:45 contributes
        // exactly 15 minutes.
        let sessions = [session("editor", Category::Productive, 36_000, 39_600)];
        let summary = summarize(&sessions, at(37_800), at(38_700));
        assert_eq!(summary.total, Duration::minutes(15));
        assert_eq!(summary.by_application[0].duration, Duration::minutes(15));
    }

    #[test]
    fn productivity_score_weights_neutral_half() {
        // 40min productive, 20min neutral, 10min distracting:
        // round(100 * (40 + 10) / 70) = 71.
        let sessions = [
            session("editor", Category::Productive, 0, 2400),
            session("browser", Category::Neutral, 2400, 3600),
            session("videos", Category::Distracting, 3600, 4200),
        ];
        let summary = summarize(&sessions, at(0), at(4200));
        assert_eq!(summary.productivity_score, 71);
    }

    #[test]
    fn summarize_is_idempotent() {
        let sessions = [
            session("editor", Category::Productive, 0, 100),
            session("browser", Category::Neutral, 100, 300),
        ];
        let first = summarize(&sessions, at(0), at(300));
        for _ in 0..5 {
            assert_eq!(summarize(&sessions, at(0), at(300)), first);
        }
    }

    #[test]
    fn groups_are_sorted_by_duration_then_key() {
        let sessions = [
            session("zsh", Category::Productive, 0, 100),
            session("browser", Category::Neutral, 100, 400),
            session("alacritty", Category::Productive, 400, 500),
        ];
        let summary = summarize(&sessions, at(0), at(500));

        let apps: Vec<&str> = summary
            .by_application
            .iter()
            .map(|v| &*v.application)
            .collect();
        // browser leads on duration; alacritty and zsh tie and fall back to
        // lexical order.
        assert_eq!(apps, vec!["browser", "alacritty", "zsh"]);

        assert_eq!(summary.by_category[0].category, Category::Neutral);
        assert_eq!(summary.by_category[1].category, Category::Productive);
    }

    #[test]
    fn sessions_outside_the_window_are_ignored() {
        let sessions = [
            session("editor", Category::Productive, 0, 100),
            session("browser", Category::Neutral, 200, 300),
        ];
        let summary = summarize(&sessions, at(100), at(200));
        assert_eq!(summary.total, Duration::zero());
        assert_eq!(summary.productivity_score, 0);
    }
}
