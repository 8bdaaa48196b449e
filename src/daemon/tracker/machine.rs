use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::{category::Category, daemon::storage::entities::Session};

use super::sampler::ForegroundWindow;

/// What the idle detector knew at tick time.
#[derive(Debug, Clone, Copy)]
pub struct IdleSnapshot {
    pub is_idle: bool,
    pub last_activity: DateTime<Utc>,
}

/// A successful sample with its category already resolved.
#[derive(Debug, Clone)]
pub struct TickObservation {
    pub window: ForegroundWindow,
    pub category: Category,
}

#[derive(Debug, Clone)]
pub struct OpenSession {
    application: Arc<str>,
    window_title: Option<Arc<str>>,
    category: Category,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
enum Phase {
    #[default]
    Stopped,
    NoSession,
    InSession(OpenSession),
    Idle,
}

/// Session boundary state machine. One instance owns the single tracked
/// stream of a process: it consumes one tick at a time and returns at most
/// one closed session, with no timers or I/O of its own.
///
/// Closing rules:
/// - application change closes at `now` and opens the next session at `now`,
///   so consecutive sessions share a boundary instant;
/// - idle closes at the last-activity timestamp, idle time is never
///   attributed to the previous application;
/// - stop closes at `now`;
/// - closed sessions shorter than the minimum are discarded (an exact
///   minimum-length session is kept).
pub struct SessionMachine {
    phase: Phase,
    min_session: Duration,
    redact_titles: bool,
}

impl SessionMachine {
    pub fn new(min_session: Duration, redact_titles: bool) -> Self {
        Self {
            phase: Phase::Stopped,
            min_session,
            redact_titles,
        }
    }

    pub fn is_tracking(&self) -> bool {
        !matches!(self.phase, Phase::Stopped)
    }

    /// Application of the currently open session, if any.
    pub fn current_application(&self) -> Option<&str> {
        match &self.phase {
            Phase::InSession(open) => Some(&open.application),
            _ => None,
        }
    }

    pub fn set_min_session(&mut self, min_session: Duration) {
        self.min_session = min_session;
    }

    pub fn set_redact_titles(&mut self, redact_titles: bool) {
        self.redact_titles = redact_titles;
    }

    /// Begins tracking. A no-op when already tracking.
    pub fn start(&mut self) {
        if matches!(self.phase, Phase::Stopped) {
            info!("Tracking started");
            self.phase = Phase::NoSession;
        }
    }

    /// Stops tracking, flushing the open session if there is one.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Option<Session> {
        let closed = match std::mem::take(&mut self.phase) {
            Phase::InSession(open) => self.close(open, now),
            _ => None,
        };
        info!("Tracking stopped");
        closed
    }

    /// Advances the machine by one polling tick. `observation` is `None`
    /// when the sample failed; failed samples never mutate the open session.
    pub fn on_tick(
        &mut self,
        observation: Option<TickObservation>,
        idle: IdleSnapshot,
        now: DateTime<Utc>,
    ) -> Option<Session> {
        match std::mem::take(&mut self.phase) {
            Phase::Stopped => {
                self.phase = Phase::Stopped;
                None
            }
            Phase::NoSession => {
                if idle.is_idle {
                    self.phase = Phase::Idle;
                    None
                } else if let Some(observation) = observation {
                    self.phase = Phase::InSession(self.open(observation, now));
                    None
                } else {
                    self.phase = Phase::NoSession;
                    None
                }
            }
            Phase::Idle => {
                match observation {
                    // Activity resumed: the new session starts at resume
                    // time, the idle gap stays unattributed.
                    Some(observation) if !idle.is_idle => {
                        self.phase = Phase::InSession(self.open(observation, now));
                        None
                    }
                    _ => {
                        self.phase = Phase::Idle;
                        None
                    }
                }
            }
            Phase::InSession(open) => {
                if idle.is_idle {
                    debug!("Idle detected, closing session for {}", open.application);
                    let closed = self.close(open, idle.last_activity.min(now));
                    self.phase = Phase::Idle;
                    return closed;
                }

                match observation {
                    None => {
                        // Transient miss, the session stays as it was.
                        self.phase = Phase::InSession(open);
                        None
                    }
                    Some(observation) if observation.window.application == open.application => {
                        self.phase = Phase::InSession(open);
                        None
                    }
                    Some(observation) => {
                        let closed = self.close(open, now);
                        self.phase = Phase::InSession(self.open(observation, now));
                        closed
                    }
                }
            }
        }
    }

    fn open(&self, observation: TickObservation, now: DateTime<Utc>) -> OpenSession {
        debug!(
            "Opening session for {} ({})",
            observation.window.application, observation.category
        );
        OpenSession {
            application: observation.window.application,
            window_title: if self.redact_titles {
                None
            } else {
                Some(observation.window.window_title)
            },
            category: observation.category,
            started_at: now,
        }
    }

    fn close(&self, open: OpenSession, end: DateTime<Utc>) -> Option<Session> {
        let duration = end - open.started_at;
        if duration <= Duration::zero() || duration < self.min_session {
            debug!(
                "Discarding sub-minimum session for {} ({duration})",
                open.application
            );
            return None;
        }

        Some(Session {
            application: open.application,
            window_title: open.window_title,
            category: open.category,
            start: open.started_at,
            end,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(seconds, 0).unwrap()
    }

    fn observation(application: &str) -> Option<TickObservation> {
        Some(TickObservation {
            window: ForegroundWindow {
                application: application.into(),
                window_title: format!("window of {application}").into(),
            },
            category: Category::Neutral,
        })
    }

    fn active(last_activity: i64) -> IdleSnapshot {
        IdleSnapshot {
            is_idle: false,
            last_activity: at(last_activity),
        }
    }

    fn idle(last_activity: i64) -> IdleSnapshot {
        IdleSnapshot {
            is_idle: true,
            last_activity: at(last_activity),
        }
    }

    fn machine() -> SessionMachine {
        let mut machine = SessionMachine::new(Duration::seconds(1), false);
        machine.start();
        machine
    }

    #[test]
    fn stopped_machine_ignores_ticks() {
        let mut machine = SessionMachine::new(Duration::seconds(1), false);
        assert!(machine
            .on_tick(observation("editor"), active(0), at(0))
            .is_none());
        assert!(!machine.is_tracking());
    }

    #[test]
    fn application_switch_closes_and_opens() {
        let mut machine = machine();
        machine.on_tick(observation("editor"), active(0), at(0));
        machine.on_tick(observation("editor"), active(5), at(5));

        let closed = machine
            .on_tick(observation("browser"), active(10), at(10))
            .expect("Switch should close the editor session");
        assert_eq!(&*closed.application, "editor");
        assert_eq!(closed.start, at(0));
        assert_eq!(closed.end, at(10));
        assert_eq!(machine.current_application(), Some("browser"));
    }

    #[test]
    fn sessions_are_gap_free_and_non_overlapping() {
        let mut machine = machine();
        let apps = ["a", "b", "a", "c", "b"];
        let mut sessions = vec![];
        for (i, app) in apps.iter().enumerate() {
            let now = i as i64 * 10;
            sessions.extend(machine.on_tick(observation(app), active(now), at(now)));
        }
        sessions.extend(machine.stop(at(50)));

        assert_eq!(sessions.len(), 5);
        for pair in sessions.windows(2) {
            assert!(pair[0].end <= pair[1].start);
            assert!(pair[0].end > pair[0].start);
        }
    }

    #[test]
    fn failed_samples_do_not_mutate_session() {
        let mut machine = machine();
        machine.on_tick(observation("editor"), active(0), at(0));
        assert!(machine.on_tick(None, active(1), at(1)).is_none());
        assert!(machine.on_tick(None, active(2), at(2)).is_none());
        assert_eq!(machine.current_application(), Some("editor"));

        let closed = machine.stop(at(10)).unwrap();
        assert_eq!(closed.start, at(0));
        assert_eq!(closed.end, at(10));
    }

    #[test]
    fn idle_closes_at_last_activity() {
        // Samples at t=0 and t=5 for one app, then no user activity. The
        // idle threshold trips at t=305; the session must end at t=5.
        let mut machine = machine();
        machine.on_tick(observation("editor"), active(0), at(0));
        machine.on_tick(observation("editor"), active(5), at(5));
        for t in [10, 100, 300] {
            assert!(machine.on_tick(observation("editor"), active(5), at(t)).is_none());
        }

        let closed = machine
            .on_tick(observation("editor"), idle(5), at(305))
            .expect("Idle should close the session");
        assert_eq!(closed.start, at(0));
        assert_eq!(closed.end, at(5));

        // Resume at t=400: new session starts at resume time.
        assert!(machine
            .on_tick(observation("editor"), active(400), at(400))
            .is_none());
        let resumed = machine.stop(at(420)).unwrap();
        assert_eq!(resumed.start, at(400));
        assert_eq!(resumed.end, at(420));
    }

    #[test]
    fn idle_session_shorter_than_minimum_is_discarded() {
        let mut machine = machine();
        machine.on_tick(observation("editor"), active(0), at(0));
        // All activity predates the session start, nothing to keep.
        assert!(machine.on_tick(observation("editor"), idle(0), at(305)).is_none());
    }

    #[test]
    fn minimum_duration_boundary() {
        let mut machine = SessionMachine::new(Duration::milliseconds(5000), false);
        machine.start();

        // Exactly the minimum is retained.
        machine.on_tick(observation("editor"), active(0), at(0));
        let closed = machine.stop(at(5)).expect("5s session should be kept");
        assert_eq!(closed.duration(), Duration::milliseconds(5000));

        // One millisecond less is discarded.
        machine.start();
        machine.on_tick(observation("editor"), active(10), at(10));
        let end = at(10) + Duration::milliseconds(4999);
        assert!(machine.stop(end).is_none());
    }

    #[test]
    fn stop_flushes_open_session_exactly_once() {
        let mut machine = machine();
        machine.on_tick(observation("editor"), active(0), at(0));
        assert!(machine.stop(at(10)).is_some());
        assert!(!machine.is_tracking());
        assert!(machine.stop(at(20)).is_none());
    }

    #[test]
    fn start_is_idempotent() {
        let mut machine = machine();
        machine.on_tick(observation("editor"), active(0), at(0));
        machine.start();
        assert_eq!(machine.current_application(), Some("editor"));
    }

    #[test]
    fn idle_without_session_opens_on_resume() {
        let mut machine = machine();
        machine.on_tick(None, idle(0), at(400));
        assert!(machine.on_tick(None, active(500), at(500)).is_none());
        machine.on_tick(observation("editor"), active(505), at(505));
        assert_eq!(machine.current_application(), Some("editor"));
    }

    #[test]
    fn redaction_drops_window_titles() {
        let mut machine = SessionMachine::new(Duration::seconds(1), true);
        machine.start();
        machine.on_tick(observation("editor"), active(0), at(0));
        let closed = machine.stop(at(10)).unwrap();
        assert_eq!(closed.window_title, None);
    }

    #[test]
    fn titles_are_kept_without_redaction() {
        let mut machine = machine();
        machine.on_tick(observation("editor"), active(0), at(0));
        let closed = machine.stop(at(10)).unwrap();
        assert_eq!(closed.window_title.as_deref(), Some("window of editor"));
    }
}
