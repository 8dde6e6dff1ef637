//! A mounted view instance.
//!
//! Each instance runs its own task that owns a [`RequestCoordinator`],
//! listens to the store's change feed and publishes what it would render on
//! a `watch` channel. Instances never write to the store; everything they
//! want done goes to the orchestrator as a trigger message.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use skylight_shared::constants::{
    CURRENT_WALLPAPER_KEYS, KEY_ERROR, KEY_HISTORY, REQUEST_TIMEOUT_SECS,
};
use skylight_shared::{DownloadResponse, Envelope, TriggerMessage};
use skylight_store::{StorageChange, Store, Tier};

use crate::coordinator::RequestCoordinator;
use crate::display::DisplayState;
use crate::error::ViewError;

#[derive(Debug, Clone)]
pub struct ViewConfig {
    /// How long to wait for this instance's own refresh before giving up.
    pub request_timeout: Duration,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug)]
enum ViewCommand {
    Refresh { topic: Option<String> },
    Shutdown,
}

/// Handle to a mounted view instance.
pub struct ViewHandle {
    id: Uuid,
    commands: mpsc::Sender<ViewCommand>,
    orchestrator: mpsc::Sender<Envelope>,
    display: watch::Receiver<DisplayState>,
    task: JoinHandle<()>,
}

/// Mount a view instance: load what is stored, start listening for changes
/// and request a refresh right away.
pub async fn mount(
    store: Store,
    orchestrator: mpsc::Sender<Envelope>,
    config: ViewConfig,
) -> Result<ViewHandle, ViewError> {
    let id = Uuid::new_v4();

    // Subscribe before reading so no write between the two is lost.
    let feed = store.subscribe();
    let initial = load_display(&store)?;

    let mut coordinator = RequestCoordinator::new(config.request_timeout, initial);
    let request = coordinator.begin_request(Instant::now(), None);

    let (display_tx, display_rx) = watch::channel(coordinator.display().clone());
    let (cmd_tx, cmd_rx) = mpsc::channel(16);

    orchestrator
        .send(Envelope::notify(request))
        .await
        .map_err(|_| ViewError::OrchestratorGone)?;

    info!(view = %id, "view instance mounted");

    let task = tokio::spawn(run_view(
        id,
        store,
        feed,
        coordinator,
        cmd_rx,
        orchestrator.clone(),
        display_tx,
    ));

    Ok(ViewHandle {
        id,
        commands: cmd_tx,
        orchestrator,
        display: display_rx,
        task,
    })
}

impl ViewHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of what the instance currently shows.
    pub fn display(&self) -> DisplayState {
        self.display.borrow().clone()
    }

    /// Receiver that observes every display update.
    pub fn watch(&self) -> watch::Receiver<DisplayState> {
        self.display.clone()
    }

    /// Ask for a new wallpaper, optionally for a specific topic.
    pub async fn refresh(&self, topic: Option<String>) -> Result<(), ViewError> {
        self.commands
            .send(ViewCommand::Refresh { topic })
            .await
            .map_err(|_| ViewError::Unmounted)
    }

    pub async fn pause_alarm(&self) -> Result<(), ViewError> {
        self.notify(TriggerMessage::PauseAlarm).await
    }

    pub async fn resume_alarm(&self) -> Result<(), ViewError> {
        self.notify(TriggerMessage::ResumeAlarm).await
    }

    /// Save the displayed wallpaper to disk and wait for the result.
    pub async fn download_current(&self) -> Result<DownloadResponse, ViewError> {
        let display = self.display();
        let filename = display
            .suggested_filename()
            .ok_or(ViewError::NothingToDownload)?;
        let current = display.wallpaper.ok_or(ViewError::NothingToDownload)?;

        let message = TriggerMessage::DownloadWallpaper {
            wallpaper_url: current.wallpaper,
            download_location: Some(current.download_url).filter(|l| !l.is_empty()),
            filename,
        };
        let (envelope, reply) = Envelope::request(message);
        self.orchestrator
            .send(envelope)
            .await
            .map_err(|_| ViewError::OrchestratorGone)?;
        reply.await.map_err(|_| ViewError::OrchestratorGone)
    }

    /// Stop the instance and wait for its task to finish.
    pub async fn unmount(self) {
        let _ = self.commands.send(ViewCommand::Shutdown).await;
        if let Err(e) = self.task.await {
            warn!(view = %self.id, error = %e, "view task ended abnormally");
        }
    }

    async fn notify(&self, message: TriggerMessage) -> Result<(), ViewError> {
        self.orchestrator
            .send(Envelope::notify(message))
            .await
            .map_err(|_| ViewError::OrchestratorGone)
    }
}

fn load_display(store: &Store) -> Result<DisplayState, ViewError> {
    let mut sync_keys = CURRENT_WALLPAPER_KEYS.to_vec();
    sync_keys.push(KEY_ERROR);
    let sync = store.get(Tier::Sync, &sync_keys)?;
    let local = store.get(Tier::Local, &[KEY_HISTORY])?;
    Ok(DisplayState::from_stored(&sync, &local))
}

async fn run_view(
    id: Uuid,
    store: Store,
    mut feed: broadcast::Receiver<StorageChange>,
    mut coordinator: RequestCoordinator,
    mut commands: mpsc::Receiver<ViewCommand>,
    orchestrator: mpsc::Sender<Envelope>,
    display: watch::Sender<DisplayState>,
) {
    loop {
        let deadline = coordinator.deadline();

        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(ViewCommand::Refresh { topic }) => {
                    let request = coordinator.begin_request(Instant::now(), topic);
                    display.send_replace(coordinator.display().clone());
                    if orchestrator.send(Envelope::notify(request)).await.is_err() {
                        warn!(view = %id, "orchestrator gone, refresh not sent");
                    }
                }
                Some(ViewCommand::Shutdown) | None => break,
            },

            event = feed.recv() => match event {
                Ok(change) => {
                    if coordinator.on_change(&change) {
                        debug!(view = %id, tier = %change.tier, "display updated");
                        display.send_replace(coordinator.display().clone());
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(view = %id, missed, "change feed lagged, reloading from store");
                    match load_display(&store) {
                        Ok(stored) => {
                            coordinator.resync(stored);
                            display.send_replace(coordinator.display().clone());
                        }
                        Err(e) => warn!(view = %id, error = %e, "reload after lag failed"),
                    }
                }
                Err(RecvError::Closed) => break,
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if coordinator.on_timeout(Instant::now()) {
                    debug!(view = %id, "refresh wait timed out");
                    display.send_replace(coordinator.display().clone());
                }
            }
        }
    }

    info!(view = %id, "view instance unmounted");
}
