use std::{env, path::PathBuf};

use anyhow::{Context, Result};

const APP_DIR_NAME: &str = "worklens";

/// Resolves and creates the directory holding settings, rules, logs and
/// recorded sessions. `%APPDATA%` on windows, `$XDG_STATE_HOME` (or
/// `~/.local/state`) elsewhere.
pub fn create_application_default_path() -> Result<PathBuf> {
    let mut path = base_state_dir()?;
    path.push(APP_DIR_NAME);
    std::fs::create_dir_all(&path)?;
    Ok(path)
}

#[cfg(windows)]
fn base_state_dir() -> Result<PathBuf> {
    env::var("APPDATA")
        .map(PathBuf::from)
        .context("APPDATA should be present on Windows")
}

#[cfg(not(windows))]
fn base_state_dir() -> Result<PathBuf> {
    if let Ok(state) = env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(state));
    }
    let home = env::var("HOME").context("Neither XDG_STATE_HOME nor HOME is set")?;
    Ok(PathBuf::from(home).join(".local/state"))
}
