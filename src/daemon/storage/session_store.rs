use std::{
    future::Future,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, AsyncSeekExt, AsyncWriteExt, BufReader},
};
use tracing::{debug, warn};

use crate::utils::time::date_to_record_name;

use super::entities::Session;

/// Interface for abstracting durable session storage. Sessions are grouped
/// into one file per UTC day of their start time.
pub trait SessionStore {
    type Appender: SessionAppender;

    /// Opens or creates the file collecting sessions for `date`.
    fn appender_for(&self, date: NaiveDate) -> impl Future<Output = Result<Self::Appender>>;

    /// Reads back every session recorded for `date`.
    fn sessions_for(&self, date: NaiveDate) -> impl Future<Output = Result<Vec<Session>>> + Send;
}

pub trait SessionAppender {
    /// Appends one closed session. Appending the same session twice is a
    /// no-op, which makes retries after a failed emit safe.
    fn append(&mut self, session: &Session) -> impl Future<Output = Result<()>>;
    fn date(&self) -> NaiveDate;
    fn flush(&mut self) -> impl Future<Output = Result<()>>;
}

/// Json-lines realization of [SessionStore].
pub struct JsonSessionStore {
    session_dir: PathBuf,
}

impl JsonSessionStore {
    pub fn new(session_dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&session_dir)?;

        Ok(Self { session_dir })
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.session_dir.join(date_to_record_name(date))
    }

    async fn read_all(path: &Path) -> Result<Vec<Session>> {
        async fn extract(path: &Path) -> std::result::Result<Vec<Session>, std::io::Error> {
            debug!("Extracting {path:?}");
            let file = File::open(path).await?;
            file.lock_shared()?;
            let buffer = BufReader::new(file);
            let mut lines = buffer.lines();
            let mut sessions = vec![];
            while let Ok(Some(line)) = lines.next_line().await {
                match serde_json::from_str::<Session>(&line) {
                    Ok(session) => sessions.push(session),
                    Err(e) => {
                        // ignore illegal values. Might happen after shutdowns
                        warn!("Skipping illegal json line in {path:?}: {e}");
                    }
                }
            }

            lines.into_inner().into_inner().unlock_async().await?;

            Ok(sessions)
        }

        match extract(path).await {
            Ok(sessions) => Ok(sessions),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(vec![]),
            Err(e) => Err(e)?,
        }
    }
}

impl SessionStore for JsonSessionStore {
    type Appender = SessionDayFile;

    async fn appender_for(&self, date: NaiveDate) -> Result<Self::Appender> {
        let path = self.path_for(date);

        // The key of the last stored session has to be recovered so that an
        // emit retried across a daemon restart stays idempotent.
        let last_key = Self::read_all(&path)
            .await?
            .last()
            .map(|session| session.emit_key());

        let file = File::options()
            .write(true)
            .create(true)
            .read(true)
            .truncate(false)
            .append(true)
            .open(path)
            .await?;

        Ok(SessionDayFile {
            file,
            date,
            last_key,
        })
    }

    async fn sessions_for(&self, date: NaiveDate) -> Result<Vec<Session>> {
        Self::read_all(&self.path_for(date)).await
    }
}

/// Reads every stored session overlapping `[from, to)`, walking the day
/// files in order. The walk starts one day before `from`: sessions are filed
/// under their start date, so one crossing midnight into the range lives in
/// the previous day's file.
pub async fn sessions_between(
    store: &impl SessionStore,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<Vec<Session>> {
    let mut collected = vec![];
    let mut day = from
        .date_naive()
        .pred_opt()
        .expect("Start of time should never happen");
    while day <= to.date_naive() {
        let sessions = store.sessions_for(day).await?;
        collected.extend(
            sessions
                .into_iter()
                .filter(|s| s.start < to && s.end > from),
        );
        day = day.succ_opt().expect("End of time should never happen");
    }
    Ok(collected)
}

pub struct SessionDayFile {
    file: File,
    date: NaiveDate,
    last_key: Option<(Arc<str>, DateTime<Utc>)>,
}

impl SessionAppender for SessionDayFile {
    async fn append(&mut self, session: &Session) -> Result<()> {
        if self.last_key.as_ref() == Some(&session.emit_key()) {
            debug!("Skipping duplicate emit of {:?}", session.emit_key());
            return Ok(());
        }

        // Semi-safe acquire-release for a file
        self.file.lock_exclusive()?;
        let result = Self::append_line(&mut self.file, session).await;
        self.file.unlock_async().await?;
        result?;

        self.last_key = Some(session.emit_key());
        Ok(())
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    async fn flush(&mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }
}

impl SessionDayFile {
    async fn append_line(file: &mut File, session: &Session) -> Result<()> {
        file.seek(std::io::SeekFrom::End(0)).await?;

        let mut buffer = serde_json::to_vec(session)?;
        buffer.push(b'\n');

        file.write_all(&buffer).await?;
        file.flush().await?;
        Ok(())
    }
}
