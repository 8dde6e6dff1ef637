use thiserror::Error;

/// Why a wallpaper could not be acquired. Never retried here; the
/// orchestrator decides what to do next.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    /// The request could not complete (DNS, connect, TLS, timeout...).
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },

    /// The response is missing fields we need or is not JSON at all.
    #[error("Invalid API response structure: {0}")]
    SchemaValidation(String),

    /// The configured API base URL cannot be turned into a request URL.
    #[error("Invalid API endpoint: {0}")]
    InvalidEndpoint(String),
}

impl AcquisitionError {
    pub(crate) fn network(e: reqwest::Error) -> Self {
        AcquisitionError::Network(e.without_url())
    }
}

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("Invalid download URL: {0}")]
    InvalidUrl(String),

    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("HTTP error! status: {status}")]
    HttpStatus { status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
