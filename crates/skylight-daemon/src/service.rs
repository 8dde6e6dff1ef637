//! The background service: one loop that reacts to install, timer and
//! trigger-message events.
//!
//! The loop itself never waits on I/O. Refreshes and downloads run on their
//! own tasks, so a slow fetch does not delay the next message and two
//! refreshes may overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use skylight_net::{Downloader, PhotoSource};
use skylight_shared::constants::ALARM_NAME;
use skylight_shared::{DownloadResponse, Envelope, TriggerMessage};
use skylight_store::HistoryMigrator;

use crate::alarm::Alarm;
use crate::lifecycle;
use crate::orchestrator::Orchestrator;

/// Events raised inside the daemon itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackgroundEvent {
    /// First start of this version.
    Installed { version: String },
    /// Any other start. Re-arms the alarm unless it was paused.
    Started,
    /// The recurring refresh timer fired.
    AlarmFired,
}

pub struct Service<S> {
    orchestrator: Arc<Orchestrator<S>>,
    downloader: Arc<Downloader>,
    migrator: HistoryMigrator,
    alarm: Alarm,
    events_tx: mpsc::Sender<BackgroundEvent>,
}

impl<S: PhotoSource> Service<S> {
    pub fn new(
        orchestrator: Arc<Orchestrator<S>>,
        downloader: Downloader,
        migrator: HistoryMigrator,
        refresh_period: Duration,
        events_tx: mpsc::Sender<BackgroundEvent>,
    ) -> Self {
        Self {
            orchestrator,
            downloader: Arc::new(downloader),
            migrator,
            alarm: Alarm::new(ALARM_NAME, refresh_period),
            events_tx,
        }
    }

    /// Run until every message sender is gone.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<BackgroundEvent>,
        mut messages: mpsc::Receiver<Envelope>,
    ) {
        info!("background service started");

        loop {
            tokio::select! {
                Some(event) = events.recv() => self.handle_event(event),

                envelope = messages.recv() => match envelope {
                    Some(envelope) => self.handle_message(envelope),
                    None => {
                        info!("all message senders closed, stopping background service");
                        break;
                    }
                },
            }
        }

        if self.alarm.is_armed() {
            self.alarm.clear();
        }
    }

    fn handle_event(&mut self, event: BackgroundEvent) {
        match event {
            BackgroundEvent::Installed { version } => {
                info!(version = %version, "handling install");
                match self.migrator.run() {
                    Ok(outcome) => debug!(?outcome, "history migration"),
                    Err(e) => error!(error = %e, "history migration failed, will retry on next start"),
                }
                self.arm_alarm();
                self.spawn_refresh(None);
                if let Err(e) = lifecycle::record_version(self.orchestrator.store(), &version) {
                    warn!(error = %e, "failed to record installed version");
                }
            }
            BackgroundEvent::Started => match lifecycle::alarm_paused(self.orchestrator.store()) {
                Ok(true) => info!("alarm was paused before restart, leaving it off"),
                Ok(false) => self.alarm.create(self.events_tx.clone()),
                Err(e) => {
                    warn!(error = %e, "could not read alarm state, arming it");
                    self.alarm.create(self.events_tx.clone());
                }
            },
            BackgroundEvent::AlarmFired => self.spawn_refresh(None),
        }
    }

    fn handle_message(&mut self, envelope: Envelope) {
        let Envelope { message, reply } = envelope;
        debug!(?message, "trigger message received");

        match message {
            TriggerMessage::UpdateWallpaper { topic_id } => self.spawn_refresh(topic_id),
            TriggerMessage::PauseAlarm => {
                self.alarm.clear();
                if let Err(e) = lifecycle::set_alarm_paused(self.orchestrator.store(), true) {
                    warn!(error = %e, "failed to persist alarm pause");
                }
            }
            TriggerMessage::ResumeAlarm => {
                self.arm_alarm();
                self.spawn_refresh(None);
            }
            TriggerMessage::DownloadWallpaper {
                wallpaper_url,
                download_location,
                filename,
            } => self.spawn_download(wallpaper_url, download_location, filename, reply),
        }
    }

    fn arm_alarm(&mut self) {
        self.alarm.create(self.events_tx.clone());
        if let Err(e) = lifecycle::set_alarm_paused(self.orchestrator.store(), false) {
            warn!(error = %e, "failed to persist alarm resume");
        }
    }

    fn spawn_refresh(&self, topic: Option<String>) {
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            if let Err(e) = orchestrator.refresh(topic).await {
                debug!(error = %e, "refresh cycle ended without commit");
            }
        });
    }

    fn spawn_download(
        &self,
        wallpaper_url: String,
        download_location: Option<String>,
        filename: String,
        reply: Option<oneshot::Sender<DownloadResponse>>,
    ) {
        let downloader = Arc::clone(&self.downloader);
        tokio::spawn(async move {
            if let Some(location) = download_location.as_deref() {
                downloader.track(location);
            }

            let response = match downloader.download(&wallpaper_url, &filename).await {
                Ok(receipt) => DownloadResponse::completed(receipt.id),
                Err(e) => {
                    warn!(filename = %filename, error = %e, "download failed");
                    DownloadResponse::failed(e.to_string())
                }
            };

            match reply {
                Some(reply) => {
                    if reply.send(response).is_err() {
                        debug!("download requester went away before the reply");
                    }
                }
                None => debug!(?response, "download finished, nobody asked for a reply"),
            }
        });
    }
}
