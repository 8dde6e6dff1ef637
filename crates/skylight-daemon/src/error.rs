use thiserror::Error;

use skylight_net::AcquisitionError;
use skylight_store::StoreError;

/// Why a refresh cycle did not commit. Every variant has already been
/// published to the `error` key by the time the caller sees it.
#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("Failed to read settings: {0}")]
    StorageRead(#[source] StoreError),

    #[error("Failed to save data: {0}")]
    StorageWrite(#[source] StoreError),
}
