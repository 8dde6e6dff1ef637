use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::ProtocolError;

/// Trigger messages sent by view instances to the background orchestrator.
///
/// Encoded as JSON objects discriminated by `action`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "action")]
pub enum TriggerMessage {
    /// Refresh now, optionally overriding the configured topic.
    #[serde(rename = "updateWallpaper")]
    UpdateWallpaper {
        #[serde(rename = "topicId", default, skip_serializing_if = "Option::is_none")]
        topic_id: Option<String>,
    },

    /// Stop the recurring refresh timer.
    #[serde(rename = "pauseAlarm")]
    PauseAlarm,

    /// Re-arm the recurring refresh timer and refresh immediately.
    #[serde(rename = "resumeAlarm")]
    ResumeAlarm,

    /// Save the full-resolution image to disk.
    #[serde(rename = "downloadWallpaper")]
    DownloadWallpaper {
        #[serde(rename = "wallpaperUrl")]
        wallpaper_url: String,
        #[serde(
            rename = "downloadLocation",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        download_location: Option<String>,
        filename: String,
    },
}

impl TriggerMessage {
    pub fn from_json(line: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Whether the sender expects a [`DownloadResponse`].
    pub fn expects_response(&self) -> bool {
        matches!(self, Self::DownloadWallpaper { .. })
    }
}

/// Reply to a [`TriggerMessage::DownloadWallpaper`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadResponse {
    pub fn completed(download_id: u64) -> Self {
        Self {
            success: true,
            download_id: Some(download_id),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            download_id: None,
            error: Some(error.into()),
        }
    }
}

/// A trigger message plus the channel its response (if any) goes back on.
#[derive(Debug)]
pub struct Envelope {
    pub message: TriggerMessage,
    pub reply: Option<oneshot::Sender<DownloadResponse>>,
}

impl Envelope {
    /// Fire-and-forget message.
    pub fn notify(message: TriggerMessage) -> Self {
        Self {
            message,
            reply: None,
        }
    }

    /// Message whose response is delivered on the returned receiver.
    pub fn request(message: TriggerMessage) -> (Self, oneshot::Receiver<DownloadResponse>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                message,
                reply: Some(tx),
            },
            rx,
        )
    }
}
