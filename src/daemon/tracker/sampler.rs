use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

use crate::window_api::WindowProbe;

/// One observation of the foreground window, produced every polling tick and
/// consumed immediately. `window` is `None` when the probe failed, which is
/// an expected steady-state event (locked screen, permission dialogs).
#[derive(Debug, Clone)]
pub struct Sample {
    pub observed_at: DateTime<Utc>,
    pub window: Option<ForegroundWindow>,
}

#[derive(Debug, Clone)]
pub struct ForegroundWindow {
    /// Normalized application identifier derived from the process path or,
    /// failing that, the window title.
    pub application: Arc<str>,
    /// Raw window title, possibly empty.
    pub window_title: Arc<str>,
}

impl ForegroundWindow {
    /// Label handed to the categorizer. Contains both the application name
    /// and the title so browser-tab rules can match hosts.
    pub fn label(&self) -> String {
        format!("{} {}", self.application, self.window_title)
    }
}

/// Wraps a platform [WindowProbe] and turns its results into [Sample]s.
/// Probe errors never escape; they are counted, and a streak of them is
/// reported once as a degraded-sampling condition while polling continues.
pub struct Sampler {
    probe: Box<dyn WindowProbe>,
    failure_streak: u32,
    degraded_after: u32,
}

impl Sampler {
    pub const DEFAULT_DEGRADED_AFTER: u32 = 5;

    pub fn new(probe: Box<dyn WindowProbe>, degraded_after: u32) -> Self {
        Self {
            probe,
            failure_streak: 0,
            degraded_after,
        }
    }

    pub fn sample(&mut self, now: DateTime<Utc>) -> Sample {
        let window = match self.probe.active_window() {
            Ok(observation) => {
                self.failure_streak = 0;
                Some(ForegroundWindow {
                    application: normalize_application(
                        &observation.process_path,
                        &observation.window_title,
                    ),
                    window_title: observation.window_title,
                })
            }
            Err(e) => {
                self.failure_streak += 1;
                debug!("Window probe failed ({} in a row): {e:?}", self.failure_streak);
                if self.failure_streak == self.degraded_after {
                    warn!(
                        "Sampling degraded, {} consecutive probe failures",
                        self.failure_streak
                    );
                }
                None
            }
        };

        Sample {
            observed_at: now,
            window,
        }
    }

    /// Idle time as reported by the platform, if it supports it. Errors are
    /// treated as "no reading", the window-change heuristic covers those
    /// environments.
    pub fn idle_reading(&mut self) -> Option<Duration> {
        match self.probe.idle_time_ms() {
            Ok(ms) => Some(Duration::milliseconds(ms as i64)),
            Err(e) => {
                debug!("No idle reading from probe: {e:?}");
                None
            }
        }
    }

    pub fn failure_streak(&self) -> u32 {
        self.failure_streak
    }
}

/// Derives a stable application identifier. Prefers the executable base name
/// and falls back to the trailing ` - ` segment of the window title, the way
/// titles like `Inbox - Mozilla Firefox` are structured.
pub fn normalize_application(process_path: &str, window_title: &str) -> Arc<str> {
    // Split on both separators, window paths show up with backslashes.
    let from_path = process_path
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .map(|name| name.to_lowercase())
        .filter(|name| !name.is_empty());

    if let Some(name) = from_path {
        return name.into();
    }

    let from_title = window_title
        .rsplit(" - ")
        .next()
        .map(|segment| segment.trim().to_lowercase())
        .filter(|segment| !segment.is_empty());

    from_title.map_or_else(|| "unknown".into(), Into::into)
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use chrono::TimeZone;

    use crate::window_api::{MockWindowProbe, WindowObservation};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1000, 0).unwrap()
    }

    #[test]
    fn failed_probe_yields_failed_sample() {
        let mut probe = MockWindowProbe::new();
        probe
            .expect_active_window()
            .returning(|| Err(anyhow!("screen locked")));

        let mut sampler = Sampler::new(Box::new(probe), 5);
        let sample = sampler.sample(now());
        assert!(sample.window.is_none());
        assert_eq!(sample.observed_at, now());
        assert_eq!(sampler.failure_streak(), 1);
    }

    #[test]
    fn success_resets_failure_streak() {
        let mut probe = MockWindowProbe::new();
        let mut results = vec![
            Err(anyhow!("no window")),
            Err(anyhow!("no window")),
            Ok(WindowObservation {
                process_path: "/usr/bin/firefox".into(),
                window_title: "Inbox - Mozilla Firefox".into(),
            }),
        ]
        .into_iter();
        probe
            .expect_active_window()
            .returning(move || results.next().unwrap());

        let mut sampler = Sampler::new(Box::new(probe), 5);
        sampler.sample(now());
        sampler.sample(now());
        assert_eq!(sampler.failure_streak(), 2);

        let sample = sampler.sample(now());
        assert!(sample.window.is_some());
        assert_eq!(sampler.failure_streak(), 0);
        assert_eq!(&*sample.window.unwrap().application, "firefox");
    }

    #[test]
    fn normalization_prefers_executable_name() {
        assert_eq!(
            &*normalize_application("/usr/bin/Code", "main.rs - Visual Studio Code"),
            "code"
        );
        assert_eq!(
            &*normalize_application("C:\\Program Files\\App\\app.exe", ""),
            "app.exe"
        );
    }

    #[test]
    fn normalization_falls_back_to_title_segment() {
        assert_eq!(
            &*normalize_application("", "Inbox - Mozilla Firefox"),
            "mozilla firefox"
        );
        assert_eq!(&*normalize_application("", ""), "unknown");
    }
}
