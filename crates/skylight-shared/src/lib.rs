//! # skylight-shared
//!
//! Types shared by every Skylight crate: the wallpaper record and its
//! persisted shape, topics, the trigger-message protocol spoken between view
//! instances and the orchestrator, and the persisted key names.

pub mod constants;
pub mod error;
pub mod protocol;
pub mod types;

pub use error::ProtocolError;
pub use protocol::{DownloadResponse, Envelope, TriggerMessage};
pub use types::{CurrentWallpaper, Topic, WallpaperRecord};
