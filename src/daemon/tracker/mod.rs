//! The single tracking stream of the daemon. [TrackingModule] owns the
//! sampler, the idle detector and the session machine, and drives all of
//! them from one loop: sampling ticks, manual commands and shutdown are
//! serialized through the same task, so the machine is never entered
//! concurrently.

pub mod idle;
pub mod machine;
pub mod sampler;
pub mod settings;

use std::{collections::VecDeque, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    category::{external::Categorizer, Category, CategoryRuleSet},
    daemon::storage::entities::Session,
    utils::clock::Clock,
};

use self::{
    idle::IdleDetector,
    machine::{IdleSnapshot, SessionMachine, TickObservation},
    sampler::{ForegroundWindow, Sampler},
    settings::TrackerSettings,
};

/// Manual operations on the tracker. Commands share the loop with sampling
/// ticks, so they can never race a session open/close.
#[derive(Debug)]
pub enum TrackerCommand {
    Start,
    Stop,
    UpdateSettings(TrackerSettings),
    UpdateRules(CategoryRuleSet),
}

/// Fire-and-forget notification surface for the embedding application.
/// Implementations must not block; a failure to deliver only concerns the
/// observer, never tracking.
pub trait TrackingObserver: Send {
    fn tracking_state_changed(&self, is_tracking: bool);
}

/// Default observer, notifications end up in the log.
pub struct LogObserver;

impl TrackingObserver for LogObserver {
    fn tracking_state_changed(&self, is_tracking: bool) {
        info!("Tracking state changed: {is_tracking}");
    }
}

/// Sessions the tracker closed but could not yet hand to storage. Bounded so
/// a stuck consumer cannot grow memory forever.
const MAX_PENDING_SESSIONS: usize = 64;

pub struct TrackingModule {
    emit: mpsc::Sender<Session>,
    commands: mpsc::Receiver<TrackerCommand>,
    sampler: Sampler,
    idle: IdleDetector,
    machine: SessionMachine,
    categorizer: Categorizer,
    settings: TrackerSettings,
    observer: Box<dyn TrackingObserver>,
    shutdown: CancellationToken,
    clock: Box<dyn Clock>,
    pending: VecDeque<Session>,
    last_observed: Option<Arc<str>>,
    cached_category: Option<(Arc<str>, Category)>,
}

impl TrackingModule {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        emit: mpsc::Sender<Session>,
        commands: mpsc::Receiver<TrackerCommand>,
        sampler: Sampler,
        categorizer: Categorizer,
        settings: TrackerSettings,
        observer: Box<dyn TrackingObserver>,
        shutdown: CancellationToken,
        clock: Box<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            emit,
            commands,
            sampler,
            idle: IdleDetector::new(now),
            machine: SessionMachine::new(settings.min_session(), settings.redact_titles),
            categorizer,
            settings,
            observer,
            shutdown,
            clock,
            pending: VecDeque::new(),
            last_observed: None,
            cached_category: None,
        }
    }

    /// Handle for reporting user input from outside the loop.
    pub fn activity_handle(&self) -> idle::ActivityHandle {
        self.idle.handle()
    }

    /// Executes the tracking event loop until shutdown.
    pub async fn run(mut self) -> Result<()> {
        self.machine.start();
        self.observer.tracking_state_changed(true);

        let mut commands_open = true;
        let mut tick_point = self.clock.instant();
        loop {
            tick_point += self.settings.poll_interval();

            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => {
                        return self.finalize().await;
                    }
                    command = self.commands.recv(), if commands_open => {
                        match command {
                            Some(command) => self.handle_command(command).await,
                            // All command senders are gone, only the tick
                            // cadence remains.
                            None => commands_open = false,
                        }
                    }
                    _ = self.clock.sleep_until(tick_point) => break,
                }
            }

            self.tick().await;
            self.flush_pending();
        }
    }

    /// One sampling tick: probe, update idle knowledge, advance the machine.
    async fn tick(&mut self) {
        let sample = self.sampler.sample(self.clock.now());
        let now = sample.observed_at;

        self.observe_activity(now, &sample);

        let snapshot = IdleSnapshot {
            is_idle: self.idle.is_idle(now, self.settings.idle_threshold()),
            last_activity: self.idle.last_activity(),
        };

        let observation = match sample.window {
            Some(window) => Some(TickObservation {
                category: self.resolve_category(&window).await,
                window,
            }),
            None => None,
        };

        let closed = self.machine.on_tick(observation, snapshot, now);
        self.queue(closed);
    }

    /// Feeds the idle detector. Platform idle readings are authoritative;
    /// when they are unavailable a change of foreground window counts as
    /// activity instead.
    fn observe_activity(&mut self, now: DateTime<Utc>, sample: &sampler::Sample) {
        if let Some(idle_for) = self.sampler.idle_reading() {
            self.idle.record_probe_idle(now, idle_for);
        } else if let Some(window) = &sample.window {
            let changed = self
                .last_observed
                .as_ref()
                .map_or(true, |last| *last != window.application);
            if changed {
                self.idle.record_activity(now);
            }
        }

        if let Some(window) = &sample.window {
            self.last_observed = Some(window.application.clone());
        }
    }

    /// Category for the sampled window, resolved once per application change
    /// and cached while the application stays in front.
    async fn resolve_category(&mut self, window: &ForegroundWindow) -> Category {
        if let Some((application, category)) = &self.cached_category {
            if *application == window.application {
                return *category;
            }
        }

        let category = self.categorizer.resolve(&window.label()).await;
        self.cached_category = Some((window.application.clone(), category));
        category
    }

    async fn handle_command(&mut self, command: TrackerCommand) {
        debug!("Handling command {command:?}");
        match command {
            TrackerCommand::Start => {
                if !self.machine.is_tracking() {
                    self.machine.start();
                    self.observer.tracking_state_changed(true);
                }
            }
            TrackerCommand::Stop => {
                if self.machine.is_tracking() {
                    let closed = self.machine.stop(self.clock.now());
                    self.queue(closed);
                    self.flush_pending();
                    self.observer.tracking_state_changed(false);
                }
            }
            TrackerCommand::UpdateSettings(settings) => match settings.validate() {
                Ok(()) => {
                    self.machine.set_min_session(settings.min_session());
                    self.machine.set_redact_titles(settings.redact_titles);
                    self.settings = settings;
                    info!("Settings updated");
                }
                Err(e) => {
                    warn!("Rejecting invalid settings update: {e}");
                }
            },
            TrackerCommand::UpdateRules(rules) => {
                self.categorizer.replace_rules(rules);
                self.cached_category = None;
                info!("Category rules updated");
            }
        }
    }

    fn queue(&mut self, closed: Option<Session>) {
        let Some(session) = closed else { return };
        if self.pending.len() >= MAX_PENDING_SESSIONS {
            warn!("Pending session queue is full, dropping the oldest session");
            self.pending.pop_front();
        }
        self.pending.push_back(session);
    }

    /// Emits queued sessions in order. A full channel leaves the rest queued
    /// for the next tick, so a session is only given up once storage has
    /// accepted it.
    fn flush_pending(&mut self) {
        while let Some(session) = self.pending.front() {
            match self.emit.try_send(session.clone()) {
                Ok(()) => {
                    self.pending.pop_front();
                }
                Err(TrySendError::Full(_)) => {
                    debug!("Session channel full, retrying on the next tick");
                    break;
                }
                Err(TrySendError::Closed(_)) => {
                    error!("Session consumer is gone, dropping closed session");
                    self.pending.pop_front();
                }
            }
        }
    }

    /// Shutdown path: flush the open session and drain the queue.
    async fn finalize(&mut self) -> Result<()> {
        let closed = self.machine.stop(self.clock.now());
        self.queue(closed);
        self.observer.tracking_state_changed(false);

        while let Some(session) = self.pending.pop_front() {
            if let Err(e) = self.emit.send(session).await {
                error!("Could not hand remaining session to storage: {e}");
                break;
            }
        }
        Ok(())
    }
}
