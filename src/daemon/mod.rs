use std::path::PathBuf;

use anyhow::Result;
use storage::{entities::Session, session_store::JsonSessionStore, StorageModule};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;
use tracker::{
    sampler::Sampler, settings::TrackerSettings, LogObserver, TrackerCommand, TrackingModule,
};

use crate::{
    category::{external::Categorizer, CategoryRuleSet},
    utils::clock::{Clock, SystemClock},
    window_api::{GenericWindowProbe, WindowProbe},
};

pub mod args;
pub mod shutdown;
pub mod storage;
pub mod tracker;

pub const SETTINGS_FILE: &str = "settings.json";
pub const RULES_FILE: &str = "rules.json";
pub const SESSION_DIR: &str = "sessions";

/// Represents the starting point for the daemon.
pub async fn start_daemon(dir: PathBuf) -> Result<()> {
    std::env::set_current_dir("/")?;

    let settings = TrackerSettings::load_or_default(&dir.join(SETTINGS_FILE))?;
    let rules = CategoryRuleSet::load_or_default(&dir.join(RULES_FILE))?;
    let probe = GenericWindowProbe::new()?;

    let (session_sender, session_receiver) = mpsc::channel::<Session>(16);
    let (_command_sender, command_receiver) = mpsc::channel::<TrackerCommand>(8);

    let shutdown_token = CancellationToken::new();

    let tracker = create_tracker(
        session_sender,
        command_receiver,
        probe,
        settings,
        rules,
        &shutdown_token,
        SystemClock,
    );

    let storage = create_storage(dir.join(SESSION_DIR), session_receiver, SystemClock)?;

    let (_, tracking_result, storage_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token),
        tracker.run(),
        storage.run(),
    );

    if let Err(tracking_result) = tracking_result {
        error!("Tracking module got an error {:?}", tracking_result);
    }

    if let Err(storage_result) = storage_result {
        error!("Storage module got an error {:?}", storage_result);
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn create_tracker(
    session_sender: mpsc::Sender<Session>,
    command_receiver: mpsc::Receiver<TrackerCommand>,
    probe: impl WindowProbe + 'static,
    settings: TrackerSettings,
    rules: CategoryRuleSet,
    shutdown_token: &CancellationToken,
    clock: impl Clock,
) -> TrackingModule {
    TrackingModule::new(
        session_sender,
        command_receiver,
        Sampler::new(Box::new(probe), Sampler::DEFAULT_DEGRADED_AFTER),
        Categorizer::new(rules),
        settings,
        Box::new(LogObserver),
        shutdown_token.clone(),
        Box::new(clock),
    )
}

fn create_storage(
    session_dir: PathBuf,
    receiver: mpsc::Receiver<Session>,
    clock: impl Clock,
) -> Result<StorageModule<JsonSessionStore>> {
    let store = JsonSessionStore::new(session_dir)?;
    Ok(StorageModule::new(receiver, store, Box::new(clock)))
}
