use std::{io::ErrorKind, path::Path, time::Duration};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Runtime configuration of the tracker. All of it can be swapped while the
/// daemon runs; an update that fails [TrackerSettings::validate] is rejected
/// and the engine keeps its last known good values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerSettings {
    /// User is considered idle after this much time without input.
    pub idle_threshold_ms: u64,
    /// Interval between sampling ticks.
    pub poll_interval_ms: u64,
    /// Closed sessions shorter than this are discarded. A session of exactly
    /// this duration is kept.
    pub min_session_ms: u64,
    /// When set, sessions are stored without the raw window title.
    pub redact_titles: bool,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            idle_threshold_ms: 5 * 60 * 1000,
            poll_interval_ms: 1000,
            min_session_ms: 5000,
            redact_titles: false,
        }
    }
}

impl TrackerSettings {
    pub fn validate(&self) -> Result<()> {
        if self.idle_threshold_ms == 0 {
            bail!("Idle threshold must be positive");
        }
        if self.poll_interval_ms == 0 {
            bail!("Poll interval must be positive");
        }
        Ok(())
    }

    /// Reads settings from a json file. A missing file means defaults; a
    /// present but invalid file is reported and replaced by defaults so the
    /// daemon always comes up.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let settings = match serde_json::from_str::<TrackerSettings>(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Ignoring unreadable settings file {path:?}: {e}");
                return Ok(Self::default());
            }
        };

        match settings.validate() {
            Ok(()) => Ok(settings),
            Err(e) => {
                warn!("Ignoring invalid settings in {path:?}: {e}");
                Ok(Self::default())
            }
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn idle_threshold(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.idle_threshold_ms as i64)
    }

    pub fn min_session(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.min_session_ms as i64)
    }
}
