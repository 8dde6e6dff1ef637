use thiserror::Error;

use skylight_store::StoreError;

#[derive(Error, Debug)]
pub enum ViewError {
    #[error("Background service is not running")]
    OrchestratorGone,

    #[error("View instance has been unmounted")]
    Unmounted,

    #[error("No wallpaper to download")]
    NothingToDownload,

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}
