//! Storage is organized through [session_store::JsonSessionStore].
//! The basic idea is:
//!  - There is a directory with all the recorded sessions.
//!  - Sessions land in the file of the UTC day they started on, one json
//!    object per line.
//!  - Appends are idempotent per `(application, start)`, so a retried emit
//!    never duplicates a session.

pub mod entities;
pub mod session_store;

use std::time::Duration;

use anyhow::Result;
use entities::Session;
use session_store::{SessionAppender, SessionStore};
use tokio::sync::mpsc::Receiver;
use tracing::{debug, info, warn};

use crate::utils::clock::Clock;

const MAX_PERSIST_ATTEMPTS: u32 = 3;
const PERSIST_RETRY_DELAY: Duration = Duration::from_millis(200);

/// Receives closed sessions from the tracker and writes them to a
/// [SessionStore]. A failing write is retried a bounded number of times;
/// after that the session is dropped with a warning and tracking goes on.
pub struct StorageModule<S: SessionStore> {
    receiver: Receiver<Session>,
    store: S,
    current: Option<S::Appender>,
    clock: Box<dyn Clock>,
}

impl<S: SessionStore> StorageModule<S> {
    pub fn new(receiver: Receiver<Session>, store: S, clock: Box<dyn Clock>) -> Self {
        Self {
            receiver,
            store,
            current: None,
            clock,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        while let Some(session) = self.receiver.recv().await {
            debug!("Persisting session {:?}", session);
            self.persist_with_retry(&session).await;
        }

        let result = self.finalize().await;
        self.receiver.close();
        result
    }

    async fn persist_with_retry(&mut self, session: &Session) {
        for attempt in 1..=MAX_PERSIST_ATTEMPTS {
            match self.persist(session).await {
                Ok(()) => {
                    info!("Persisted session for {}", session.application);
                    return;
                }
                Err(e) => {
                    debug!("Persist attempt {attempt} failed: {e:?}");
                    // A fresh handle is taken on the next attempt, the old
                    // one might be poisoned.
                    self.current = None;
                    self.clock.sleep(PERSIST_RETRY_DELAY).await;
                }
            }
        }
        warn!(
            "Dropping session for {} after {MAX_PERSIST_ATTEMPTS} failed writes",
            session.application
        );
    }

    async fn persist(&mut self, session: &Session) -> Result<()> {
        let date = session.start.date_naive();

        match self.current.take() {
            Some(mut appender) if appender.date() != date => {
                appender.flush().await?;
            }
            Some(appender) => self.current = Some(appender),
            None => {}
        }

        if self.current.is_none() {
            self.current = Some(self.store.appender_for(date).await?);
        }

        self.current
            .as_mut()
            .expect("Appender was just created")
            .append(session)
            .await
    }

    async fn finalize(&mut self) -> Result<()> {
        if let Some(appender) = self.current.as_mut() {
            appender.flush().await?;
        }
        Ok(())
    }
}
