//! # skylight-daemon
//!
//! Background service for Skylight.
//!
//! This binary provides:
//! - **Refresh orchestration**: fetches a random photo for the configured
//!   topic and commits it to the dual-tier store, on install, on a recurring
//!   timer and on request
//! - **History migration** from the synchronized tier to the local tier,
//!   checked at every start
//! - **Downloads** of the full-resolution image with Unsplash download
//!   tracking
//! - **A control channel**: trigger messages as JSON lines on stdin,
//!   download responses as JSON lines on stdout
//! - **A headless view instance** that logs what a view would display

mod alarm;
mod config;
mod error;
mod lifecycle;
mod orchestrator;
mod service;
mod stdio;

use std::sync::Arc;

use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use skylight_net::{build_http_client, Downloader, UnsplashClient};
use skylight_shared::constants::APP_NAME;
use skylight_store::{Database, HistoryMigrator, Store, StoreConfig};
use skylight_view::{DisplayState, ViewConfig};

use crate::config::DaemonConfig;
use crate::lifecycle::StartKind;
use crate::orchestrator::{ErrorTiming, Orchestrator};
use crate::service::{BackgroundEvent, Service};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG). Stdout carries responses,
    //    so logs go to stderr.
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("info,skylight_daemon=debug,skylight_store=info")
            }),
        )
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting {APP_NAME} v{version}");

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = DaemonConfig::from_env();
    info!(
        api_base = %config.api_base,
        download_dir = %config.download_dir.display(),
        refresh_minutes = config.refresh_interval.as_secs() / 60,
        access_key_set = !config.access_key.is_empty(),
        "Loaded configuration"
    );

    // -----------------------------------------------------------------------
    // 3. Storage and history migration
    // -----------------------------------------------------------------------
    let store = open_store(&config)?;

    let migrator = HistoryMigrator::new(store.clone());
    match migrator.run() {
        Ok(outcome) => info!(?outcome, "History migration checked"),
        Err(e) => warn!(error = %e, "History migration failed, will retry on next start"),
    }

    // -----------------------------------------------------------------------
    // 4. Background service
    // -----------------------------------------------------------------------
    let http = build_http_client(config.http_timeout)?;
    let source = UnsplashClient::new(http.clone(), &config.api_base, &config.access_key);
    let downloader = Downloader::new(http, &config.access_key, &config.download_dir);
    let orchestrator = Arc::new(Orchestrator::new(
        source,
        store.clone(),
        ErrorTiming {
            fetch_error_clear: config.fetch_error_clear,
            save_error_clear: config.save_error_clear,
        },
    ));

    let (events_tx, events_rx) = mpsc::channel(32);
    let (messages_tx, messages_rx) = mpsc::channel(64);

    let start = match lifecycle::detect(&store, version) {
        Ok(StartKind::Install) => {
            info!("Fresh install detected");
            BackgroundEvent::Installed {
                version: version.to_string(),
            }
        }
        Ok(StartKind::Update { from }) => {
            info!(from = %from, to = version, "Update detected");
            BackgroundEvent::Installed {
                version: version.to_string(),
            }
        }
        Ok(StartKind::Restart) => BackgroundEvent::Started,
        Err(e) => {
            warn!(error = %e, "Could not read installed version, treating as restart");
            BackgroundEvent::Started
        }
    };
    events_tx.send(start).await?;

    let service = Service::new(
        orchestrator,
        downloader,
        migrator,
        config.refresh_interval,
        events_tx,
    );
    let mut service_task = tokio::spawn(service.run(events_rx, messages_rx));

    // -----------------------------------------------------------------------
    // 5. Headless view and control channel
    // -----------------------------------------------------------------------
    let view = skylight_view::mount(store, messages_tx.clone(), ViewConfig::default()).await?;
    let mut display = view.watch();
    let view_id = view.id();
    tokio::spawn(async move {
        while display.changed().await.is_ok() {
            let state = display.borrow_and_update().clone();
            log_display(view_id, &state);
        }
    });

    tokio::spawn(async move {
        let stdin = BufReader::new(tokio::io::stdin());
        match stdio::serve_lines(stdin, tokio::io::stdout(), messages_tx).await {
            Ok(_) => debug!("Control channel closed"),
            Err(e) => warn!(error = %e, "Control channel failed"),
        }
    });

    // -----------------------------------------------------------------------
    // 6. Run until Ctrl+C
    // -----------------------------------------------------------------------
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
        result = &mut service_task => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Background service stopped unexpectedly");
            }
        }
    }

    view.unmount().await;
    Ok(())
}

fn open_store(config: &DaemonConfig) -> anyhow::Result<Store> {
    let db = match &config.db_path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            info!(path = %path.display(), "opening database");
            Database::open_at(path)?
        }
        None => Database::new()?,
    };
    Ok(Store::new(db, StoreConfig::default()))
}

fn log_display(view: impl std::fmt::Display, state: &DisplayState) {
    let wallpaper = state.wallpaper.as_ref().map(|w| w.wallpaper.as_str());
    let photographer = state.wallpaper.as_ref().map(|w| w.photographer.as_str());
    info!(
        view = %view,
        loading = state.loading,
        wallpaper = wallpaper.unwrap_or("-"),
        photographer = photographer.unwrap_or("-"),
        error = state.error.as_deref().unwrap_or("-"),
        history = state.history.len(),
        "display"
    );
}
