use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed trigger message: {0}")]
    Malformed(#[from] serde_json::Error),
}
